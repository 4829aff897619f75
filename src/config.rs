use std::env;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::generation::RetryPolicy;
use crate::generation::transport::DEFAULT_REQUEST_TIMEOUT;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub const DEFAULT_CONFIG_FILE: &str = "collabnest.toml";

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Optional on-disk overrides, `collabnest.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    /// Load from the process environment plus the optional TOML file named by
    /// `COLLABNEST_CONFIG` (default `collabnest.toml` in the working directory).
    pub fn load() -> Self {
        let path = env::var("COLLABNEST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let file = match std::fs::read_to_string(&path) {
            Ok(text) => match FileConfig::parse(&text) {
                Ok(file) => {
                    tracing::info!("loaded config from {}", path.display());
                    file
                }
                Err(e) => {
                    tracing::warn!("ignoring invalid config {}: {e}", path.display());
                    FileConfig::default()
                }
            },
            Err(_) => FileConfig::default(),
        };

        Self::resolve(file, |key| env::var(key).ok())
    }

    /// Precedence: environment, then file, then built-in defaults.
    pub fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let section = file.generation;
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty(API_KEY_VAR);
        if api_key.is_none() {
            tracing::warn!("{API_KEY_VAR} not set, assistant and matcher unavailable");
        }

        let model = non_empty("COLLABNEST_MODEL")
            .or(section.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let endpoint = non_empty("COLLABNEST_ENDPOINT")
            .or(section.endpoint)
            .unwrap_or_else(|| format!("{DEFAULT_API_BASE}/{model}:generateContent"));

        let mut retry = RetryPolicy::default();
        match section.max_attempts.map(NonZeroU32::new) {
            Some(Some(n)) => retry.max_attempts = n,
            Some(None) => tracing::warn!(
                "max_attempts must be at least 1, using {}",
                retry.max_attempts
            ),
            None => {}
        }
        if let Some(ms) = section.base_delay_ms {
            retry.base_delay = Duration::from_millis(ms);
        }

        let request_timeout = section
            .request_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Config {
            api_key,
            model,
            endpoint,
            retry,
            request_timeout,
        }
    }
}

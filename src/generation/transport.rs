use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::TransportError;
use crate::generation::types::GenerationRequest;

pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw outcome of one POST: status and body, uninterpreted.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Body exceeded `MAX_RESPONSE_BYTES` and was cut short or not read at all.
    pub truncated: bool,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            truncated: false,
        }
    }

    pub fn oversized(status: u16, mut body: Vec<u8>) -> Self {
        body.truncate(MAX_RESPONSE_BYTES);
        Self {
            status,
            body,
            truncated: true,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One network round trip per call. The retry loop lives above this seam.
pub trait Transport: Send + Sync {
    fn post(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// reqwest-backed transport for a generateContent endpoint.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    api_key: String,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(endpoint, api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            request_timeout,
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Transport for HttpTransport {
    async fn post(&self, request: &GenerationRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();

        // Oversized bodies keep their status so the caller still classifies by code
        if let Some(len) = response
            .content_length()
            .map(|l| l as usize)
            .filter(|l| *l > MAX_RESPONSE_BYTES)
        {
            debug!(status = status.as_u16(), len, "response body over limit, not read");
            return Ok(TransportResponse::oversized(status.as_u16(), Vec::new()));
        }

        let bytes = if status.is_success() {
            response.bytes().await?
        } else {
            response.bytes().await.unwrap_or_default()
        };
        if bytes.len() > MAX_RESPONSE_BYTES {
            debug!(status = status.as_u16(), len = bytes.len(), "response body truncated");
            return Ok(TransportResponse::oversized(
                status.as_u16(),
                bytes[..MAX_RESPONSE_BYTES].to_vec(),
            ));
        }

        Ok(TransportResponse::new(status.as_u16(), bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_body_is_capped_and_flagged() {
        let response = TransportResponse::oversized(400, vec![b'x'; MAX_RESPONSE_BYTES + 10]);
        assert_eq!(response.status, 400);
        assert_eq!(response.body.len(), MAX_RESPONSE_BYTES);
        assert!(response.truncated);
        assert!(!TransportResponse::new(200, "{}").truncated);
    }
}

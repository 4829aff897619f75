use thiserror::Error;

/// Failure of a single transport call: the request never produced a status line,
/// or a success body could not be read. `Other` is for `Transport` implementations
/// that do not go through reqwest.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Terminal outcome of a `generate` call. Exactly one of these is surfaced per call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    #[error("request rejected with status {status}: {message}")]
    ClientRequest { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("gave up after {attempts} attempts (last status {last_status})")]
    TransientExhausted { attempts: u32, last_status: u16 },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl GenerationError {
    /// Status code carried by the error, if it came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ClientRequest { status, .. } => Some(*status),
            Self::TransientExhausted { last_status, .. } => Some(*last_status),
            _ => None,
        }
    }

    /// Returns true when a caller-level retry could plausibly succeed later.
    /// The client has already spent its own attempts by the time this is asked.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::TransientExhausted { .. } => true,
            Self::ClientRequest { .. } | Self::MalformedResponse(_) | Self::Cancelled { .. } => {
                false
            }
        }
    }

    /// Sanitized message safe for returning to tool callers.
    /// Does not leak endpoint URLs, connection details, or upstream error bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "could not reach the generation service".to_string(),
            Self::ClientRequest { status, .. } => {
                format!("the generation service rejected the request (HTTP {status})")
            }
            Self::MalformedResponse(_) => {
                "the generation service returned an unusable response".to_string()
            }
            Self::TransientExhausted { attempts, .. } => {
                format!("the generation service is busy, gave up after {attempts} attempts")
            }
            Self::Cancelled { .. } => "request cancelled".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_and_exhausted_are_retryable() {
        assert!(GenerationError::Network(TransportError::Other("reset".into())).is_retryable());
        assert!(
            GenerationError::TransientExhausted {
                attempts: 5,
                last_status: 503
            }
            .is_retryable()
        );
        assert!(
            !GenerationError::ClientRequest {
                status: 400,
                message: "bad".into()
            }
            .is_retryable()
        );
        assert!(!GenerationError::MalformedResponse("empty".into()).is_retryable());
        assert!(!GenerationError::Cancelled { attempts: 1 }.is_retryable());
    }

    #[test]
    fn user_message_hides_upstream_body() {
        let err = GenerationError::ClientRequest {
            status: 400,
            message: "API key not valid: AIza-secret".into(),
        };
        let msg = err.user_message();
        assert!(msg.contains("400"));
        assert!(!msg.contains("AIza"));
    }

    #[test]
    fn status_is_exposed_for_http_variants() {
        let err = GenerationError::TransientExhausted {
            attempts: 3,
            last_status: 429,
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(GenerationError::Cancelled { attempts: 0 }.status(), None);
    }
}

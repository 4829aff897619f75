use std::num::NonZeroU32;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{GenerationError, TransportError};
use crate::generation::backoff::RetryPolicy;
use crate::generation::transport::{
    HttpTransport, MAX_RESPONSE_BYTES, Transport, TransportResponse,
};
use crate::generation::types::{self, GenerateContentResponse, GenerationRequest};

/// What a single attempt amounted to, decided from the status code alone.
enum Attempt {
    Text(String),
    Transient(TransientCause),
    Terminal(GenerationError),
}

enum TransientCause {
    Status(u16),
    Network(TransportError),
}

fn millis(wait: Duration) -> u64 {
    u64::try_from(wait.as_millis()).unwrap_or(u64::MAX)
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

fn classify(response: TransportResponse) -> Attempt {
    if response.is_success() {
        if response.truncated {
            return Attempt::Terminal(GenerationError::MalformedResponse(format!(
                "response body exceeds {MAX_RESPONSE_BYTES} bytes"
            )));
        }
        let parsed: GenerateContentResponse = match serde_json::from_slice(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Attempt::Terminal(GenerationError::MalformedResponse(format!(
                    "invalid JSON body: {e}"
                )));
            }
        };
        return match parsed.into_text() {
            Some(text) => Attempt::Text(text),
            None => Attempt::Terminal(GenerationError::MalformedResponse(
                "no text at candidates[0].content.parts[0]".to_string(),
            )),
        };
    }

    if is_transient_status(response.status) {
        return Attempt::Transient(TransientCause::Status(response.status));
    }

    let message = types::error_message(response.status, &response.body);
    warn!(status = response.status, %message, "generation request rejected");
    Attempt::Terminal(GenerationError::ClientRequest {
        status: response.status,
        message,
    })
}

/// Generation client that retries rate limits and server errors with doubling backoff.
///
/// Holds only immutable configuration; every call starts from a fresh `RetryState`,
/// so one client can serve any number of concurrent calls.
pub struct CompletionClient<T = HttpTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl CompletionClient<HttpTransport> {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, TransportError> {
        Ok(Self::with_transport(
            HttpTransport::new(endpoint, api_key)?,
            RetryPolicy::default(),
        ))
    }
}

impl<T: Transport> CompletionClient<T> {
    pub fn with_transport(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Generate text using the client's configured attempt budget.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.generate_with_attempts(request, self.policy.max_attempts)
            .await
    }

    pub async fn generate_with_attempts(
        &self,
        request: &GenerationRequest,
        max_attempts: NonZeroU32,
    ) -> Result<String, GenerationError> {
        self.generate_cancellable(request, max_attempts, &CancellationToken::new())
            .await
    }

    /// Generate text, aborting the in-flight attempt or pending wait when `cancel` fires.
    ///
    /// `max_attempts` counts every request sent, the first one included.
    pub async fn generate_cancellable(
        &self,
        request: &GenerationRequest,
        max_attempts: NonZeroU32,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let mut state = self.policy.start_with(max_attempts);

        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled {
                    attempts: state.attempt(),
                });
            }

            let attempt = state.attempt() + 1;
            debug!(attempt, max_attempts = state.max_attempts(), "sending generation request");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(GenerationError::Cancelled { attempts: attempt });
                }
                result = self.transport.post(request) => result,
            };

            let cause = match result {
                Ok(response) => match classify(response) {
                    Attempt::Text(text) => {
                        debug!(attempt, "generation succeeded");
                        return Ok(text);
                    }
                    Attempt::Terminal(err) => return Err(err),
                    Attempt::Transient(cause) => cause,
                },
                Err(e) => TransientCause::Network(e),
            };

            if state.is_last_attempt() {
                return Err(match cause {
                    TransientCause::Network(e) => {
                        warn!(attempt, error = %e, "network error on final attempt");
                        GenerationError::Network(e)
                    }
                    TransientCause::Status(status) => {
                        warn!(attempt, status, "retries exhausted");
                        GenerationError::TransientExhausted {
                            attempts: attempt,
                            last_status: status,
                        }
                    }
                });
            }

            let wait = state.advance();
            match &cause {
                TransientCause::Network(e) => warn!(
                    attempt,
                    error = %e,
                    wait_ms = millis(wait),
                    "network error, retrying"
                ),
                TransientCause::Status(status) => warn!(
                    attempt,
                    status,
                    wait_ms = millis(wait),
                    "transient status, retrying"
                ),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(GenerationError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(4000)), 4000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn oversized_ok_body_is_malformed_not_transient() {
        let attempt = classify(TransportResponse::oversized(200, b"{\"candidates\":".to_vec()));
        assert!(matches!(
            attempt,
            Attempt::Terminal(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn oversized_error_body_is_classified_by_status() {
        let attempt = classify(TransportResponse::oversized(400, Vec::new()));
        match attempt {
            Attempt::Terminal(GenerationError::ClientRequest { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad Request");
            }
            _ => panic!("expected a terminal client error"),
        }

        let attempt = classify(TransportResponse::oversized(503, Vec::new()));
        assert!(matches!(
            attempt,
            Attempt::Transient(TransientCause::Status(503))
        ));
    }
}

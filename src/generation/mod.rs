pub mod backoff;
pub mod client;
pub mod transport;
pub mod types;

pub use backoff::{RetryPolicy, RetryState};
pub use client::CompletionClient;
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use types::{Content, GenerationConfig, GenerationRequest, Part, Role};


// Provider module
// HTTP client for an OpenAI-compatible embeddings + chat completions API

pub mod openai;

use thiserror::Error;

pub use openai::OpenAiClient;

/// Failure of a single call to the hosted model provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,
    #[error("Provider returned HTTP {0}")]
    Status(u16),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("Provider call was cancelled: {0}")]
    Cancelled(String),
}

impl From<ureq::Error> for ProviderError {
    #[inline]
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::StatusCode(status) => Self::Status(status),
            ureq::Error::Timeout(_) => Self::Timeout,
            ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => Self::Timeout,
            other => Self::Transport(other.to_string()),
        }
    }
}

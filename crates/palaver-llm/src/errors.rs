use thiserror::Error;

/// Top-level error type for model invocation.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid model configuration: {0}")]
    InvalidConfiguration(String),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected request ({status}): {body}")]
    Provider { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

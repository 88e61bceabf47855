use thiserror::Error;

/// Errors from the chat completion client.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed chat completion response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("azure provider requires an endpoint")]
    MissingEndpoint,
}

pub type LlmResult<T> = Result<T, LlmError>;

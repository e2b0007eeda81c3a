use thiserror::Error;

/// Cloneable so one failed in-flight request can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("HTTP {status}: {details}")]
    Http { status: u16, details: String },

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::RequestFailed(e.to_string())
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

//! Clients for the services a document worker depends on: the document
//! API, object storage and the generative-text backend.

mod api;
mod genai;
mod retry;
mod storage;

pub use api::DocumentApiClient;
pub use genai::{GeminiClient, GeminiSettings, GenAiError, TextGenerator};
pub use retry::RetryPolicy;
pub use storage::{ObjectStore, S3ObjectStore, S3Settings, StorageError};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    DecodeError(String),

    #[error("Invalid client configuration: {0}")]
    ConfigError(String),
}

impl ClientError {
    /// Transport failures, timeouts, throttling and server errors may
    /// succeed on a later attempt; everything else will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ConnectionError(_) | ClientError::Timeout => true,
            ClientError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            ClientError::DecodeError(_) | ClientError::ConfigError(_) => false,
        }
    }

    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::Timeout
        } else if error.is_decode() {
            ClientError::DecodeError(error.to_string())
        } else {
            ClientError::ConnectionError(error.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Document ID must be a positive integer (got {0})")]
    NonPositiveId(i128),

    #[error("Invalid document ID: {0:?}")]
    InvalidId(String),

    #[error("Unknown worker kind: {0}")]
    UnknownKind(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

mod codec;
mod topology;

pub use codec::{decode_result, decode_task, encode_result, encode_task, ResultSchema};
pub use topology::{QueueTopology, EXCHANGE_NAME};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Task body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Task body too large: {0} bytes")]
    TaskTooLarge(usize),

    #[error("Malformed task body: {0:?}")]
    MalformedTask(String),

    #[error("Invalid document ID: {0}")]
    InvalidId(#[from] docflow_core::CoreError),

    #[error("Malformed result message: {0}")]
    MalformedResult(String),

    #[error("Unknown status literal {literal:?} for {kind} results")]
    UnknownStatus {
        kind: docflow_core::WorkerKind,
        literal: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Task bodies carry a single integer; anything larger is rejected unread.
pub const MAX_TASK_BODY_SIZE: usize = 64;

/// Content type set on every published result.
pub const RESULT_CONTENT_TYPE: &str = "application/json";

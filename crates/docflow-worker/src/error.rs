use docflow_core::DocumentId;
use std::time::Duration;
use thiserror::Error;

/// The document's required input could not be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Could not fetch valid content for doc ID {0}.")]
    MissingContent(DocumentId),

    #[error("Could not fetch valid metadata or storagePath for doc ID {0}.")]
    MissingStoragePath(DocumentId),

    #[error("Could not download file {0} from MinIO.")]
    DownloadFailed(String),

    #[error("Fetching content for doc ID {id} timed out after {limit:?}.")]
    TimedOut { id: DocumentId, limit: Duration },

    #[error("Fetching content for doc ID {id} was interrupted: {reason}")]
    Interrupted { id: DocumentId, reason: String },
}

/// The transformation engine rejected or failed on its input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Engine failure, carried verbatim into the published error details.
    #[error("{0}")]
    Engine(String),

    #[error("Could not convert document into pages: {0}")]
    Rasterize(String),

    #[error("Expected {expected} content, got {actual}")]
    UnsupportedContent {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Transformation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Transformation panicked: {0}")]
    Panicked(String),
}

/// Either stage that turns a task into a failed result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Broker rejected publish: {0}")]
    Broker(#[from] lapin::Error),

    #[error("Broker negatively acknowledged the result")]
    Nacked,

    #[error("Publish timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Publish interrupted: {0}")]
    Interrupted(String),
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Broker error: {0}")]
    Other(String),
}

use crate::{DocumentId, WorkerKind};
use serde::{Deserialize, Serialize};

/// Terminal state of a processed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStatus {
    /// Transformation produced a payload
    Completed,
    /// Fetch or transformation failed; see error details
    Failed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ResultStatus::Failed)
    }
}

/// Outcome published once per processed task.
///
/// Fields are private so a result cannot be altered after construction, and
/// a failed result can never carry a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentResult {
    document_id: DocumentId,
    kind: WorkerKind,
    status: ResultStatus,
    payload: String,
    error_details: Option<String>,
}

impl DocumentResult {
    pub fn completed(
        document_id: DocumentId,
        kind: WorkerKind,
        payload: impl Into<String>,
    ) -> Self {
        DocumentResult {
            document_id,
            kind,
            status: ResultStatus::Completed,
            payload: payload.into(),
            error_details: None,
        }
    }

    pub fn failed(document_id: DocumentId, kind: WorkerKind, error: impl Into<String>) -> Self {
        DocumentResult {
            document_id,
            kind,
            status: ResultStatus::Failed,
            payload: String::new(),
            error_details: Some(error.into()),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    /// Extracted text or summary; empty when failed.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Present only when the status is [`ResultStatus::Failed`].
    pub fn error_details(&self) -> Option<&str> {
        self.error_details.as_deref()
    }
}

mod document;
mod error;
mod kind;
mod result;

pub use document::{DocumentContent, DocumentId, DocumentMetadata};
pub use error::{CoreError, Result};
pub use kind::WorkerKind;
pub use result::{DocumentResult, ResultStatus};

/// Marker substituted for a page whose OCR failed.
pub const OCR_PAGE_FAILED_MARKER: &str = "[OCR failed for this page]";

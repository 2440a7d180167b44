use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The transformation a worker process applies to its documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Text extraction from a scanned file
    Ocr,
    /// Summarization of previously extracted text
    #[serde(alias = "genai")]
    Summary,
}

impl WorkerKind {
    pub const ALL: [WorkerKind; 2] = [WorkerKind::Ocr, WorkerKind::Summary];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Ocr => "ocr",
            WorkerKind::Summary => "summary",
        }
    }
}

impl FromStr for WorkerKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ocr" => Ok(WorkerKind::Ocr),
            "summary" | "genai" => Ok(WorkerKind::Summary),
            other => Err(CoreError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

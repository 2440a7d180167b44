use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a document awaiting processing.
///
/// Always positive; the only way to obtain one is through [`DocumentId::new`]
/// or parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct DocumentId(u64);

impl DocumentId {
    pub fn new(value: u64) -> Result<Self> {
        if value == 0 {
            return Err(CoreError::NonPositiveId(0));
        }
        Ok(DocumentId(value))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for DocumentId {
    type Error = CoreError;

    fn try_from(value: u64) -> Result<Self> {
        DocumentId::new(value)
    }
}

impl TryFrom<i64> for DocumentId {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(CoreError::NonPositiveId(value as i128));
        }
        DocumentId::new(value as u64)
    }
}

impl From<DocumentId> for u64 {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl FromStr for DocumentId {
    type Err = CoreError;

    /// Parses a decimal integer, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let value: i128 = trimmed
            .parse()
            .map_err(|_| CoreError::InvalidId(trimmed.to_string()))?;

        if value <= 0 {
            return Err(CoreError::NonPositiveId(value));
        }

        u64::try_from(value)
            .map(DocumentId)
            .map_err(|_| CoreError::InvalidId(trimmed.to_string()))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document record as served by the document API.
///
/// Every field is optional: workers only rely on the one their
/// transformation needs and treat its absence as a fetch failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl DocumentMetadata {
    /// Extracted text, if present and non-empty.
    pub fn content_text(&self) -> Option<&str> {
        self.content.as_deref().filter(|text| !text.is_empty())
    }

    /// Object-storage key of the original file, if present and non-empty.
    pub fn storage_key(&self) -> Option<&str> {
        self.storage_path.as_deref().filter(|path| !path.is_empty())
    }
}

/// Input handed to a transformation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    /// Raw file bytes downloaded from object storage.
    Binary { storage_path: String, bytes: Vec<u8> },
    /// Previously extracted text.
    Text(String),
}

impl DocumentContent {
    pub fn variant_name(&self) -> &'static str {
        match self {
            DocumentContent::Binary { .. } => "binary",
            DocumentContent::Text(_) => "text",
        }
    }
}

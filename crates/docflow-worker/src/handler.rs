use crate::error::TransformError;
use async_trait::async_trait;
use docflow_core::DocumentContent;

/// Kind-specific work applied to fetched document content.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Produce the result payload (extracted text or summary).
    async fn transform(&self, content: &DocumentContent) -> Result<String, TransformError>;
}

use crate::error::FetchError;
use async_trait::async_trait;
use docflow_client::{DocumentApiClient, ObjectStore};
use docflow_core::{DocumentContent, DocumentId, DocumentMetadata};
use std::sync::Arc;
use tracing::{debug, warn};

/// Looks up a document's metadata; `None` covers every failure.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, id: DocumentId) -> Option<DocumentMetadata>;
}

#[async_trait]
impl MetadataSource for DocumentApiClient {
    async fn fetch_metadata(&self, id: DocumentId) -> Option<DocumentMetadata> {
        DocumentApiClient::fetch_metadata(self, id).await
    }
}

/// Produces the input a transformation needs for one document.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, id: DocumentId) -> Result<DocumentContent, FetchError>;
}

/// Supplies the previously extracted text of a document.
pub struct TextContentSource {
    metadata: Arc<dyn MetadataSource>,
}

impl TextContentSource {
    pub fn new(metadata: Arc<dyn MetadataSource>) -> Self {
        TextContentSource { metadata }
    }
}

#[async_trait]
impl ContentSource for TextContentSource {
    async fn fetch(&self, id: DocumentId) -> Result<DocumentContent, FetchError> {
        let metadata = self.metadata.fetch_metadata(id).await;

        let text = metadata
            .as_ref()
            .and_then(DocumentMetadata::content_text)
            .ok_or(FetchError::MissingContent(id))?;

        debug!(document_id = %id, chars = text.len(), "Fetched document text");
        Ok(DocumentContent::Text(text.to_string()))
    }
}

/// Supplies the original file of a document from object storage.
pub struct BinaryContentSource {
    metadata: Arc<dyn MetadataSource>,
    store: Arc<dyn ObjectStore>,
}

impl BinaryContentSource {
    pub fn new(metadata: Arc<dyn MetadataSource>, store: Arc<dyn ObjectStore>) -> Self {
        BinaryContentSource { metadata, store }
    }
}

#[async_trait]
impl ContentSource for BinaryContentSource {
    async fn fetch(&self, id: DocumentId) -> Result<DocumentContent, FetchError> {
        let metadata = self.metadata.fetch_metadata(id).await;

        let storage_path = metadata
            .as_ref()
            .and_then(DocumentMetadata::storage_key)
            .ok_or(FetchError::MissingStoragePath(id))?
            .to_string();

        let bytes = match self.store.get(&storage_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    document_id = %id,
                    storage_path = %storage_path,
                    error = %e,
                    "Error downloading file from object storage"
                );
                return Err(FetchError::DownloadFailed(storage_path));
            }
        };

        debug!(document_id = %id, bytes = bytes.len(), "Downloaded document file");
        Ok(DocumentContent::Binary {
            storage_path,
            bytes,
        })
    }
}

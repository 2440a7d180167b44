use crate::{ClientError, Result, RetryPolicy};
use docflow_core::{DocumentId, DocumentMetadata};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the document metadata API.
#[derive(Debug, Clone)]
pub struct DocumentApiClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl DocumentApiClient {
    /// Build a client for `base_url` (e.g. `http://paperless-rest-api:8080`).
    ///
    /// A zero `timeout` leaves requests unbounded.
    pub fn new(base_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::ConfigError(e.to_string()))?;

        Ok(DocumentApiClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch document metadata, logging and swallowing any failure.
    pub async fn fetch_metadata(&self, id: DocumentId) -> Option<DocumentMetadata> {
        match self.try_fetch_metadata(id).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(document_id = %id, error = %e, "Error fetching metadata for document");
                None
            }
        }
    }

    /// Fetch document metadata, retrying transient failures.
    pub async fn try_fetch_metadata(&self, id: DocumentId) -> Result<DocumentMetadata> {
        let url = format!("{}/api/documents/{}", self.base_url, id);

        self.retry
            .run(|_| self.get_metadata_once(&url), ClientError::is_retryable)
            .await
    }

    async fn get_metadata_once(&self, url: &str) -> Result<DocumentMetadata> {
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<DocumentMetadata>()
            .await
            .map_err(|e| ClientError::DecodeError(e.to_string()))
    }
}

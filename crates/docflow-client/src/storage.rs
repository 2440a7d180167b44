use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object is empty: {0}")]
    Empty(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid storage configuration: {0}")]
    Config(String),
}

/// Read access to the bucket holding original document files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full object stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Connection settings for an S3-compatible store such as MinIO.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

/// [`ObjectStore`] backed by an S3-compatible service, path-style addressed.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
}

impl S3ObjectStore {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
        };

        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .with_path_style();

        Ok(S3ObjectStore { bucket })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        debug!(bucket = %self.bucket.name(), key, "Downloading object");

        let response = match self.bucket.get_object(key).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::Backend(e.to_string())),
        };

        match response.status_code() {
            200..=299 => {}
            404 => return Err(StorageError::NotFound(key.to_string())),
            status => {
                return Err(StorageError::Backend(format!(
                    "unexpected status {} for {}",
                    status, key
                )))
            }
        }

        let bytes = response.bytes().to_vec();
        if bytes.is_empty() {
            return Err(StorageError::Empty(key.to_string()));
        }

        Ok(bytes)
    }
}

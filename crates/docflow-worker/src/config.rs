//! Worker configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional YAML
//! file, `DOCFLOW__SECTION__KEY` variables, then the legacy variable names
//! the deployment already sets (`RABBITMQ_HOST`, `GOOGLE_API_KEY`, ...).

use crate::delivery::AckPolicy;
use docflow_client::{GeminiSettings, RetryPolicy, S3Settings};
use docflow_core::WorkerKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Legacy environment variables and the setting each one overrides.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("RABBITMQ_HOST", "broker.host"),
    ("RABBITMQ_PORT", "broker.port"),
    ("RABBITMQ_USER", "broker.username"),
    ("RABBITMQ_PASS", "broker.password"),
    ("API_URL", "api.base_url"),
    ("MINIO_URL", "storage.endpoint"),
    ("MINIO_ACCESS_KEY", "storage.access_key"),
    ("MINIO_SECRET_KEY", "storage.secret_key"),
    ("MINIO_BUCKET_NAME", "storage.bucket"),
    ("GOOGLE_API_KEY", "genai.api_key"),
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required setting {key} (set {env})")]
    Missing { key: &'static str, env: &'static str },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub broker: BrokerSettings,
    pub api: ApiSettings,
    pub storage: StorageSettings,
    pub genai: GenAiSettings,
    pub ocr: OcrSettings,
    pub pipeline: PipelineSettings,
    pub monitoring: MonitoringSettings,
}

/// Message broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Fixed delay between connection attempts
    pub reconnect_delay_secs: u64,
    /// Unacknowledged deliveries the broker may push at once
    pub prefetch: u16,
    /// Declare the topic exchange instead of assuming it exists
    pub declare_exchange: bool,
}

/// Document API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

/// Object storage settings (OCR worker only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Generative backend settings (summary worker only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenAiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// OCR tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub pdftoppm_path: String,
    pub tesseract_path: String,
    pub language: String,
    pub dpi: u32,
}

/// Per-message processing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub ack_policy: AckPolicy,
    /// Stage time limits; 0 disables the limit
    pub fetch_timeout_secs: u64,
    pub transform_timeout_secs: u64,
    pub publish_timeout_secs: u64,
}

/// Monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "user".to_string(),
            password: "password".to_string(),
            vhost: "/".to_string(),
            reconnect_delay_secs: 5,
            prefetch: 1,
            declare_exchange: true,
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://paperless-rest-api:8080".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "documents".to_string(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
        }
    }
}

impl Default for GenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: GeminiSettings::DEFAULT_ENDPOINT.to_string(),
            model: GeminiSettings::DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            pdftoppm_path: "pdftoppm".to_string(),
            tesseract_path: "tesseract".to_string(),
            language: "eng".to_string(),
            dpi: 300,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ack_policy: AckPolicy::default(),
            fetch_timeout_secs: 120,
            transform_timeout_secs: 900,
            publish_timeout_secs: 30,
        }
    }
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from an optional file and the process environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let env = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::load_from(path, env)
    }

    /// Load configuration from an optional file and the given environment.
    pub fn load_from(
        path: Option<&str>,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&WorkerConfig::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let prefixed: HashMap<String, String> = env
            .iter()
            .filter(|(key, _)| key.starts_with("DOCFLOW__"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        builder = builder.add_source(
            config::Environment::with_prefix("DOCFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(prefixed)),
        );

        for (var, key) in LEGACY_ENV {
            if let Some(value) = env.get(*var) {
                builder = builder.set_override(*key, value.clone())?;
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Check the settings a worker of `kind` cannot start without.
    pub fn validate(&self, kind: WorkerKind) -> Result<(), ConfigError> {
        match kind {
            WorkerKind::Summary => {
                if self.genai.api_key.is_empty() {
                    return Err(ConfigError::Missing {
                        key: "genai.api_key",
                        env: "GOOGLE_API_KEY",
                    });
                }
            }
            WorkerKind::Ocr => {
                if self.storage.access_key.is_empty() {
                    return Err(ConfigError::Missing {
                        key: "storage.access_key",
                        env: "MINIO_ACCESS_KEY",
                    });
                }
                if self.storage.secret_key.is_empty() {
                    return Err(ConfigError::Missing {
                        key: "storage.secret_key",
                        env: "MINIO_SECRET_KEY",
                    });
                }
            }
        }

        Ok(())
    }

    /// Consumer tag: `<kind>-worker-<hostname>-<pid>-<random>`.
    pub fn generate_consumer_tag(kind: WorkerKind) -> String {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let random = uuid::Uuid::new_v4().simple().to_string();

        format!("{}-worker-{}-{}-{}", kind, hostname, std::process::id(), &random[..8])
    }
}

impl BrokerSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_secs(10),
        )
    }
}

impl StorageSettings {
    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            endpoint: self.endpoint.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
        }
    }
}

impl GenAiSettings {
    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(1), Duration::from_secs(30))
    }
}

fn optional_limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl PipelineSettings {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        optional_limit(self.fetch_timeout_secs)
    }

    pub fn transform_timeout(&self) -> Option<Duration> {
        optional_limit(self.transform_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Option<Duration> {
        optional_limit(self.publish_timeout_secs)
    }
}

//! Document-processing worker: consumes document ids from a task queue,
//! runs one transformation per document and publishes the outcome.

pub mod config;
pub mod connection;
pub mod delivery;
pub mod error;
pub mod handler;
pub mod ocr;
pub mod pipeline;
pub mod publisher;
pub mod source;
pub mod summarizer;
pub mod worker;

pub use config::WorkerConfig;
pub use connection::ConnectionManager;
pub use delivery::{AckPolicy, AmqpDelivery, Delivery};
pub use error::{BrokerError, FetchError, ProcessingError, PublishError, TransformError};
pub use handler::Transformer;
pub use ocr::{OcrBackend, OcrTransformer, PageImage, PageRasterizer};
pub use pipeline::{Outcome, Pipeline};
pub use publisher::{AmqpPublisher, ResultPublisher};
pub use source::{BinaryContentSource, ContentSource, MetadataSource, TextContentSource};
pub use summarizer::Summarizer;
pub use worker::Worker;

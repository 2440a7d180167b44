//! Per-delivery processing: parse, fetch, transform, publish, acknowledge.

use crate::config::PipelineSettings;
use crate::delivery::{AckPolicy, Delivery};
use crate::error::{FetchError, ProcessingError, PublishError, TransformError};
use crate::handler::Transformer;
use crate::publisher::ResultPublisher;
use crate::source::ContentSource;
use docflow_core::{DocumentId, DocumentResult, WorkerKind};
use docflow_protocol::decode_task;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How a single delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The body was not a valid task; nothing was published.
    Discarded,
    /// A COMPLETED result was published.
    Completed,
    /// A FAILED result was published.
    Failed,
    /// A result was produced but could not be published.
    PublishFailed,
}

/// Why a guarded stage did not return.
#[derive(Debug)]
enum Interruption {
    TimedOut(Duration),
    Panicked(String),
    Cancelled,
}

impl Interruption {
    fn reason(&self) -> String {
        match self {
            Interruption::TimedOut(limit) => format!("timed out after {:?}", limit),
            Interruption::Panicked(message) => {
                format!("task panicked during processing: {}", message)
            }
            Interruption::Cancelled => "task was cancelled".to_string(),
        }
    }
}

/// Drives deliveries through the processing stages of one worker kind.
#[derive(Clone)]
pub struct Pipeline {
    kind: WorkerKind,
    source: Arc<dyn ContentSource>,
    transformer: Arc<dyn Transformer>,
    publisher: Arc<dyn ResultPublisher>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        kind: WorkerKind,
        source: Arc<dyn ContentSource>,
        transformer: Arc<dyn Transformer>,
        publisher: Arc<dyn ResultPublisher>,
        settings: PipelineSettings,
    ) -> Self {
        Pipeline {
            kind,
            source,
            transformer,
            publisher,
            settings,
        }
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn ack_policy(&self) -> AckPolicy {
        self.settings.ack_policy
    }

    /// Process one delivery to completion.
    ///
    /// The delivery is settled exactly once on every path: acked, or with
    /// [`AckPolicy::AfterConfirmedPublish`] rejected for redelivery when
    /// the result could not be published.
    pub async fn handle<D: Delivery + ?Sized>(&self, delivery: &D) -> Outcome {
        let delivery_tag = delivery.delivery_tag();
        let policy = self.settings.ack_policy;

        if policy == AckPolicy::OnReceive {
            settle(delivery, false).await;
        }

        let id = match decode_task(delivery.body()) {
            Ok(id) => id,
            Err(e) => {
                warn!(delivery_tag, error = %e, "Discarding malformed task");
                if policy != AckPolicy::OnReceive {
                    settle(delivery, false).await;
                }
                return Outcome::Discarded;
            }
        };

        info!(
            document_id = %id,
            delivery_tag,
            kind = %self.kind,
            "Received document for processing"
        );

        let outcome = self.process(id).await;

        match policy {
            AckPolicy::OnReceive => {}
            AckPolicy::AfterProcessing => settle(delivery, false).await,
            AckPolicy::AfterConfirmedPublish => {
                settle(delivery, outcome == Outcome::PublishFailed).await
            }
        }

        debug!(document_id = %id, delivery_tag, ?outcome, "Delivery settled");
        outcome
    }

    async fn process(&self, id: DocumentId) -> Outcome {
        let result = match self.produce(id).await {
            Ok(payload) => {
                info!(document_id = %id, chars = payload.len(), "Document processed");
                DocumentResult::completed(id, self.kind, payload)
            }
            Err(e) => {
                error!(document_id = %id, error = %e, "Document processing failed");
                DocumentResult::failed(id, self.kind, e.to_string())
            }
        };

        match self.publish(&result).await {
            Ok(()) if result.status().is_failed() => Outcome::Failed,
            Ok(()) => Outcome::Completed,
            Err(e) => {
                error!(document_id = %id, error = %e, "Failed to publish result");
                Outcome::PublishFailed
            }
        }
    }

    async fn produce(&self, id: DocumentId) -> Result<String, ProcessingError> {
        let source = self.source.clone();
        let content = match guarded(self.settings.fetch_timeout(), async move {
            source.fetch(id).await
        })
        .await
        {
            Ok(fetched) => fetched?,
            Err(Interruption::TimedOut(limit)) => {
                return Err(FetchError::TimedOut { id, limit }.into())
            }
            Err(interruption) => {
                return Err(FetchError::Interrupted {
                    id,
                    reason: interruption.reason(),
                }
                .into())
            }
        };

        let transformer = self.transformer.clone();
        let payload = match guarded(self.settings.transform_timeout(), async move {
            transformer.transform(&content).await
        })
        .await
        {
            Ok(transformed) => transformed?,
            Err(Interruption::TimedOut(limit)) => {
                return Err(TransformError::TimedOut(limit).into())
            }
            Err(interruption) => {
                return Err(TransformError::Panicked(interruption.reason()).into())
            }
        };

        Ok(payload)
    }

    async fn publish(&self, result: &DocumentResult) -> Result<(), PublishError> {
        let publisher = self.publisher.clone();
        let result = result.clone();

        match guarded(self.settings.publish_timeout(), async move {
            publisher.publish(&result).await
        })
        .await
        {
            Ok(published) => published,
            Err(Interruption::TimedOut(limit)) => Err(PublishError::TimedOut(limit)),
            Err(interruption) => Err(PublishError::Interrupted(interruption.reason())),
        }
    }
}

/// Ack, or reject with requeue. A failure here cannot be recovered from
/// in the pipeline; the broker redelivers once the channel closes.
async fn settle<D: Delivery + ?Sized>(delivery: &D, requeue: bool) {
    let delivery_tag = delivery.delivery_tag();

    let settled = if requeue {
        delivery.reject(true).await
    } else {
        delivery.ack().await
    };

    match settled {
        Ok(()) if requeue => warn!(delivery_tag, "Rejected delivery for redelivery"),
        Ok(()) => debug!(delivery_tag, "Acknowledged delivery"),
        Err(e) => error!(delivery_tag, error = %e, "Failed to settle delivery"),
    }
}

/// Run `future` on its own task so a panic or an expired `limit` is
/// reported instead of unwinding through the pipeline.
async fn guarded<T, F>(limit: Option<Duration>, future: F) -> Result<T, Interruption>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(future);

    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return Err(Interruption::TimedOut(limit));
            }
        },
        None => handle.await,
    };

    joined.map_err(|e| {
        if e.is_panic() {
            Interruption::Panicked(panic_message(e.into_panic()))
        } else {
            Interruption::Cancelled
        }
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

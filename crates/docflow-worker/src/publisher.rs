use crate::error::PublishError;
use async_trait::async_trait;
use docflow_core::DocumentResult;
use docflow_protocol::{encode_result, QueueTopology, RESULT_CONTENT_TYPE};
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use tracing::info;

/// Sends a finished result to the downstream consumer.
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    async fn publish(&self, result: &DocumentResult) -> Result<(), PublishError>;
}

/// Publishes results to the exchange under the worker kind's result
/// routing key.
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
    routing_key: String,
    await_confirm: bool,
}

impl AmqpPublisher {
    /// `await_confirm` requires the channel to be in confirm mode.
    pub fn new(channel: Channel, topology: &QueueTopology, await_confirm: bool) -> Self {
        AmqpPublisher {
            channel,
            exchange: topology.exchange.to_string(),
            routing_key: topology.result_routing_key.to_string(),
            await_confirm,
        }
    }
}

#[async_trait]
impl ResultPublisher for AmqpPublisher {
    async fn publish(&self, result: &DocumentResult) -> Result<(), PublishError> {
        let body = encode_result(result);
        let properties = BasicProperties::default().with_content_type(RESULT_CONTENT_TYPE.into());

        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await?;

        if self.await_confirm && confirm.await?.is_nack() {
            return Err(PublishError::Nacked);
        }

        info!(
            document_id = %result.document_id(),
            status = result.status().as_str(),
            routing_key = %self.routing_key,
            "Published result"
        );
        Ok(())
    }
}

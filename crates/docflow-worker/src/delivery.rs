use crate::error::BrokerError;
use async_trait::async_trait;
use lapin::options::{BasicAckOptions, BasicRejectOptions};
use serde::{Deserialize, Serialize};

/// When a delivery is acknowledged relative to its processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Ack as soon as the message arrives, before it is parsed.
    OnReceive,
    /// Ack once processing ends, whatever happened (at most one attempt
    /// per delivery).
    #[default]
    AfterProcessing,
    /// Ack only once the result was published; a failed publish rejects the
    /// delivery with requeue so the broker redelivers it.
    AfterConfirmedPublish,
}

impl AckPolicy {
    /// Whether published results must be confirmed by the broker.
    pub fn requires_publisher_confirms(&self) -> bool {
        matches!(self, AckPolicy::AfterConfirmedPublish)
    }
}

/// One task message as handed to the pipeline, with its acknowledgment
/// handle.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn body(&self) -> &[u8];

    fn delivery_tag(&self) -> u64;

    async fn ack(&self) -> Result<(), BrokerError>;

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// [`Delivery`] backed by an AMQP message.
pub struct AmqpDelivery(lapin::message::Delivery);

impl From<lapin::message::Delivery> for AmqpDelivery {
    fn from(delivery: lapin::message::Delivery) -> Self {
        AmqpDelivery(delivery)
    }
}

#[async_trait]
impl Delivery for AmqpDelivery {
    fn body(&self) -> &[u8] {
        &self.0.data
    }

    fn delivery_tag(&self) -> u64 {
        self.0.delivery_tag
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        self.0.acker.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.0.acker.reject(BasicRejectOptions { requeue }).await?;
        Ok(())
    }
}

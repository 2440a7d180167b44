use crate::config::WorkerConfig;
use crate::connection::ConnectionManager;
use crate::delivery::AmqpDelivery;
use crate::error::BrokerError;
use crate::handler::Transformer;
use crate::pipeline::Pipeline;
use crate::publisher::AmqpPublisher;
use crate::source::ContentSource;
use docflow_core::WorkerKind;
use docflow_protocol::QueueTopology;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicQosOptions, ConfirmSelectOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ExchangeKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why a broker session stopped.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    StreamEnded,
}

/// Consumes one worker kind's task queue, one delivery at a time.
pub struct Worker {
    kind: WorkerKind,
    topology: QueueTopology,
    config: WorkerConfig,
    consumer_tag: String,
    connections: ConnectionManager,
    source: Arc<dyn ContentSource>,
    transformer: Arc<dyn Transformer>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        kind: WorkerKind,
        config: WorkerConfig,
        source: Arc<dyn ContentSource>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Worker {
            kind,
            topology: QueueTopology::for_kind(kind),
            consumer_tag: WorkerConfig::generate_consumer_tag(kind),
            connections: ConnectionManager::new(config.broker.clone()),
            config,
            source,
            transformer,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the worker between deliveries.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Run until shutdown, reconnecting whenever the broker session ends.
    pub async fn run(&self) -> Result<(), BrokerError> {
        info!(
            kind = %self.kind,
            consumer_tag = %self.consumer_tag,
            queue = self.topology.task_queue,
            ack_policy = ?self.config.pipeline.ack_policy,
            "Starting worker"
        );

        loop {
            let connection = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                connection = self.connections.connect() => connection,
            };

            match self.consume(&connection).await {
                Ok(SessionEnd::Shutdown) => {
                    if let Err(e) = connection.close(200, "worker shutdown").await {
                        debug!(error = %e, "Error closing broker connection");
                    }
                    break;
                }
                Ok(SessionEnd::StreamEnded) => {
                    warn!("Consumer stream ended, reconnecting");
                }
                Err(e) => {
                    error!(error = %e, "Broker session failed, reconnecting");
                }
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.broker.reconnect_delay()) => {}
            }
        }

        info!(kind = %self.kind, "Worker shut down");
        Ok(())
    }

    async fn consume(&self, connection: &Connection) -> Result<SessionEnd, BrokerError> {
        let channel = connection.create_channel().await?;
        channel
            .basic_qos(self.config.broker.prefetch, BasicQosOptions::default())
            .await?;
        self.declare_topology(&channel).await?;

        let ack_policy = self.config.pipeline.ack_policy;
        if ack_policy.requires_publisher_confirms() {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await?;
        }

        let publisher = AmqpPublisher::new(
            channel.clone(),
            &self.topology,
            ack_policy.requires_publisher_confirms(),
        );
        let pipeline = Pipeline::new(
            self.kind,
            self.source.clone(),
            self.transformer.clone(),
            Arc::new(publisher),
            self.config.pipeline.clone(),
        );

        let mut consumer = channel
            .basic_consume(
                self.topology.task_queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue = self.topology.task_queue, "Waiting for messages");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(SessionEnd::Shutdown),
                next = consumer.next() => next,
            };

            match next {
                Some(Ok(delivery)) => {
                    let delivery = AmqpDelivery::from(delivery);
                    pipeline.handle(&delivery).await;
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::StreamEnded),
            }
        }
    }

    async fn declare_topology(&self, channel: &Channel) -> Result<(), BrokerError> {
        let topology = &self.topology;

        if self.config.broker.declare_exchange {
            channel
                .exchange_declare(
                    topology.exchange,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..ExchangeDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        channel
            .queue_declare(
                topology.task_queue,
                QueueDeclareOptions {
                    durable: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                topology.task_queue,
                topology.exchange,
                topology.task_routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        debug!(
            exchange = topology.exchange,
            queue = topology.task_queue,
            routing_key = topology.task_routing_key,
            "Declared task queue"
        );
        Ok(())
    }
}

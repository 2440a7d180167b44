use crate::config::BrokerSettings;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{Connection, ConnectionProperties};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Opens broker connections, waiting out broker unavailability.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    settings: BrokerSettings,
}

impl ConnectionManager {
    pub fn new(settings: BrokerSettings) -> Self {
        ConnectionManager { settings }
    }

    /// Connect to the broker, retrying forever with a fixed delay.
    pub async fn connect(&self) -> Connection {
        let uri = self.uri();
        let delay = self.settings.reconnect_delay();

        let connection = retry_forever(delay, || {
            Connection::connect_uri(uri.clone(), ConnectionProperties::default())
        })
        .await;

        info!(
            host = %self.settings.host,
            port = self.settings.port,
            "Successfully connected to RabbitMQ"
        );
        connection
    }

    fn uri(&self) -> AMQPUri {
        let mut uri = AMQPUri::default();
        uri.authority = AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: self.settings.username.clone(),
                password: self.settings.password.clone(),
            },
            host: self.settings.host.clone(),
            port: self.settings.port,
        };
        uri.vhost = self.settings.vhost.clone();
        uri
    }
}

/// Run `attempt` until it succeeds, sleeping `delay` after each failure.
///
/// No backoff growth and no attempt limit.
pub async fn retry_forever<T, E, F, Fut>(delay: Duration, mut attempt: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => return value,
            Err(e) => {
                warn!(
                    attempt = attempts,
                    error = %e,
                    "Failed to connect to RabbitMQ. Retrying in {:?}...",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

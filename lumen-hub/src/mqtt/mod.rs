pub mod ingest;

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::watch;

use crate::config::MqttConfig;

/// Fixed payload published by the HTTP test-publish endpoint.
pub const TEST_PAYLOAD: &[u8] = b"123";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Owned broker client with a cloneable publish handle.
///
/// `connect` builds the client; the returned [`EventLoop`] must be driven
/// by [`ingest::run`], which also keeps the connection state channel
/// up to date.
#[derive(Clone)]
pub struct MqttService {
    client: AsyncClient,
    ingest_topic: String,
    state: watch::Receiver<ConnectionState>,
}

impl MqttService {
    pub fn connect(config: &MqttConfig) -> (Self, EventLoop, watch::Sender<ConnectionState>) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 100);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let service = Self {
            client,
            ingest_topic: config.ingest_topic.clone(),
            state: state_rx,
        };

        (service, eventloop, state_tx)
    }

    pub fn ingest_topic(&self) -> &str {
        &self.ingest_topic
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), MqttError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.into())
            .await?;
        Ok(())
    }

    /// Publish the fixed test payload to the ingest topic.
    pub async fn publish_test(&self) -> Result<(), MqttError> {
        self.publish(&self.ingest_topic, TEST_PAYLOAD).await
    }

    pub(crate) async fn subscribe_ingest(&self) -> Result<(), MqttError> {
        self.client
            .subscribe(&self.ingest_topic, QoS::AtLeastOnce)
            .await?;
        Ok(())
    }

    pub(crate) async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

use std::time::Duration;

use lumen_core::{Device, DeviceAnnouncement, DeviceId, DeviceKind, DeviceStatus};
use rumqttc::{Event, EventLoop, Packet};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::registry::{DeviceRegistry, RegistryError};

use super::{ConnectionState, MqttService};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Drive the broker event loop until shutdown.
///
/// Subscribes to the ingest topic on every successful handshake and applies
/// decoded device announcements to the registry. Event loop errors mark the
/// connection Disconnected and are followed by a delayed re-poll, which
/// makes the client reconnect.
pub async fn run<R: DeviceRegistry>(
    service: MqttService,
    mut eventloop: EventLoop,
    state: watch::Sender<ConnectionState>,
    registry: R,
    shutdown: CancellationToken,
) {
    info!(topic = %service.ingest_topic(), "starting MQTT ingest listener");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("shutdown signal received");
                let _ = service.disconnect().await;
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to MQTT broker");
                    let _ = state.send(ConnectionState::Connected);
                    if let Err(e) = service.subscribe_ingest().await {
                        error!(error = %e, topic = %service.ingest_topic(), "failed to subscribe");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!(topic = %service.ingest_topic(), "subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handle_message(
                        &registry,
                        service.ingest_topic(),
                        &publish.topic,
                        &publish.payload,
                    )
                    .await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT event loop error, reconnecting");
                    let _ = state.send(ConnectionState::Disconnected);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }

    info!("MQTT ingest listener stopped");
}

/// Decode and apply a single inbound message.
///
/// Messages on other topics and malformed payloads are logged and skipped;
/// nothing here may take the listener down.
pub async fn handle_message<R: DeviceRegistry>(
    registry: &R,
    ingest_topic: &str,
    topic: &str,
    payload: &[u8],
) {
    if topic != ingest_topic {
        debug!(%topic, "message on unexpected topic, skipping");
        return;
    }

    let announcement: DeviceAnnouncement = match serde_json::from_slice(payload) {
        Ok(announcement) => announcement,
        Err(e) => {
            warn!(
                error = %e,
                payload_size = payload.len(),
                "malformed announcement payload, skipping"
            );
            return;
        }
    };

    info!(
        device_name = %announcement.device_name,
        device_model = %announcement.device_model,
        device_sn = %announcement.device_sn,
        device_init = announcement.device_init,
        "received device announcement"
    );

    if let Err(e) = apply_announcement(registry, topic, &announcement).await {
        error!(
            error = %e,
            device_sn = %announcement.device_sn,
            "failed to apply announcement"
        );
    }
}

/// Upsert the announced device by serial number and mark it online.
async fn apply_announcement<R: DeviceRegistry>(
    registry: &R,
    topic: &str,
    announcement: &DeviceAnnouncement,
) -> Result<(), RegistryError> {
    let now = jiff::Timestamp::now();

    match registry.get_by_serial(&announcement.device_sn).await? {
        Some(device) => {
            registry.update_status(device.id, DeviceStatus::Online).await?;
            registry.touch_last_message(device.id, now).await?;
        }
        None => {
            let device = Device {
                id: DeviceId::new(),
                name: announcement.device_name.clone(),
                model: announcement.device_model.clone(),
                serial_number: announcement.device_sn.clone(),
                kind: DeviceKind::Other,
                status: DeviceStatus::Offline,
                firmware_version: None,
                ip_address: None,
                mqtt_topic: topic.to_string(),
                last_message_received: Some(now),
                created_at: now,
                updated_at: now,
                is_active: true,
            };
            let id = device.id;

            registry.register(device).await?;
            registry.update_status(id, DeviceStatus::Online).await?;
        }
    }

    Ok(())
}

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::mqtt::ConnectionState;
use crate::registry::DeviceRegistry;

use super::{ApiState, error_response};

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    pub code: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MqttStatusResponse {
    pub connected: bool,
}

/// Publish the fixed test payload to the ingest topic.
///
/// POST /api/mqtt/publish
pub async fn publish_test_message<R>(State(state): State<ApiState<R>>) -> Response
where
    R: DeviceRegistry,
{
    match state.mqtt.publish_test().await {
        Ok(()) => (StatusCode::OK, Json(PublishResponse { code: 0 })).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// Report the broker connection state.
///
/// GET /api/mqtt/status
pub async fn mqtt_status<R>(State(state): State<ApiState<R>>) -> Response
where
    R: DeviceRegistry,
{
    let connected = state.mqtt.connection_state() == ConnectionState::Connected;
    Json(MqttStatusResponse { connected }).into_response()
}

pub mod devices;
pub mod mqtt;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::mqtt::MqttService;
use crate::registry::{DeviceRegistry, RegistryError};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState<R>
where
    R: DeviceRegistry,
{
    pub registry: R,
    pub mqtt: MqttService,
}

/// Create the full API router with all endpoints.
pub fn api_router<R>(registry: R, mqtt: MqttService) -> Router
where
    R: DeviceRegistry,
{
    let state = ApiState { registry, mqtt };

    Router::new()
        .route("/health", get(health))
        .route("/api/devices", post(devices::register_device::<R>))
        .route("/api/devices", get(devices::list_devices::<R>))
        .route("/api/devices/{id}", get(devices::get_device::<R>))
        .route(
            "/api/devices/{id}/status",
            post(devices::update_device_status::<R>),
        )
        .route("/api/mqtt/publish", post(mqtt::publish_test_message::<R>))
        .route("/api/mqtt/status", get(mqtt::mqtt_status::<R>))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

pub(crate) fn registry_error_response(err: RegistryError) -> Response {
    match &err {
        RegistryError::NotFound => error_response(StatusCode::NOT_FOUND, "device not found"),
        RegistryError::DuplicateSerial(_) | RegistryError::DuplicateId(_) => {
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        RegistryError::SerialTooShort => error_response(StatusCode::BAD_REQUEST, err.to_string()),
        _ => {
            tracing::error!(error = %err, "registry error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "registry error")
        }
    }
}

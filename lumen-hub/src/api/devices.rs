use std::collections::HashSet;
use std::net::IpAddr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lumen_core::{Device, DeviceId, DeviceKind, DeviceStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::{
    DeviceRegistry,
    filter::{DeviceFilter, DeviceSortBy, Pagination, QueryOptions, SortOrder},
};

use super::{ApiState, error_response, registry_error_response};

/// Request body for registering a new device.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterDeviceRequest {
    /// Optional ID. If not provided, a new UUID will be generated.
    pub id: Option<Uuid>,
    pub name: String,
    pub model: String,
    pub serial_number: String,
    /// Device kind: "lamp", "sensor", "switch", "controller", "other".
    /// Defaults to "other".
    pub kind: Option<String>,
    pub firmware_version: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub mqtt_topic: Option<String>,
}

/// Response body for a device.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub id: String,
    pub name: String,
    pub model: String,
    pub serial_number: String,
    pub kind: String,
    pub status: String,
    pub firmware_version: Option<String>,
    pub ip_address: Option<String>,
    pub mqtt_topic: String,
    pub last_message_received: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_active: bool,
}

impl From<Device> for DeviceResponse {
    fn from(d: Device) -> Self {
        Self {
            id: d.id.0.to_string(),
            name: d.name,
            model: d.model,
            serial_number: d.serial_number,
            kind: d.kind.as_str().to_string(),
            status: d.status.as_str().to_string(),
            firmware_version: d.firmware_version,
            ip_address: d.ip_address.map(|ip| ip.to_string()),
            mqtt_topic: d.mqtt_topic,
            last_message_received: d.last_message_received.map(|t| t.to_string()),
            created_at: d.created_at.to_string(),
            updated_at: d.updated_at.to_string(),
            is_active: d.is_active,
        }
    }
}

/// Response body for list of devices.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListDevicesResponse {
    pub devices: Vec<DeviceResponse>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDevicesQuery {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Request body for a status update.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    /// One of "online", "offline", "error", "maintenance".
    pub status: String,
}

/// Register a new device.
///
/// POST /api/devices
pub async fn register_device<R>(
    State(state): State<ApiState<R>>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Response
where
    R: DeviceRegistry,
{
    let kind = match request.kind.as_deref() {
        Some(raw) => match raw.parse::<DeviceKind>() {
            Ok(kind) => kind,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => DeviceKind::Other,
    };

    let now = jiff::Timestamp::now();
    let device = Device {
        id: DeviceId(request.id.unwrap_or_else(Uuid::new_v4)),
        name: request.name,
        model: request.model,
        serial_number: request.serial_number,
        kind,
        // New records always start offline
        status: DeviceStatus::Offline,
        firmware_version: request.firmware_version,
        ip_address: request.ip_address,
        mqtt_topic: request.mqtt_topic.unwrap_or_default(),
        last_message_received: None,
        created_at: now,
        updated_at: now,
        is_active: true,
    };

    match state.registry.register(device.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(DeviceResponse::from(device))).into_response(),
        Err(e) => registry_error_response(e),
    }
}

/// Get a device by ID.
///
/// GET /api/devices/:id
pub async fn get_device<R>(State(state): State<ApiState<R>>, Path(id): Path<String>) -> Response
where
    R: DeviceRegistry,
{
    let id = match id.parse::<Uuid>() {
        Ok(uuid) => DeviceId(uuid),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "invalid device id"),
    };

    match state.registry.get(id).await {
        Ok(Some(device)) => (StatusCode::OK, Json(DeviceResponse::from(device))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "device not found"),
        Err(e) => registry_error_response(e),
    }
}

/// List devices, newest first.
///
/// GET /api/devices
pub async fn list_devices<R>(
    State(state): State<ApiState<R>>,
    Query(query): Query<ListDevicesQuery>,
) -> Response
where
    R: DeviceRegistry,
{
    let mut filter = DeviceFilter::default();

    if let Some(raw) = &query.status {
        match raw.parse::<DeviceStatus>() {
            Ok(status) => filter.statuses = Some(HashSet::from([status])),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }

    if let Some(raw) = &query.kind {
        match raw.parse::<DeviceKind>() {
            Ok(kind) => filter.kinds = Some(HashSet::from([kind])),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }

    filter.active_only = query.active.unwrap_or(false);

    let options = QueryOptions {
        filter,
        sort_by: DeviceSortBy::CreatedAt,
        sort_order: SortOrder::Desc,
        pagination: Pagination {
            offset: query.offset.unwrap_or(0),
            limit: Some(query.limit.unwrap_or(100)),
        },
    };

    match state.registry.list(options).await {
        Ok(devices) => {
            let total = devices.len();
            let response = ListDevicesResponse {
                devices: devices.into_iter().map(DeviceResponse::from).collect(),
                total,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => registry_error_response(e),
    }
}

/// Update the status of a device.
///
/// POST /api/devices/:id/status
pub async fn update_device_status<R>(
    State(state): State<ApiState<R>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Response
where
    R: DeviceRegistry,
{
    let id = match id.parse::<Uuid>() {
        Ok(uuid) => DeviceId(uuid),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "invalid device id"),
    };

    // Unknown status names are rejected here; the stored value is untouched.
    let status = match request.status.parse::<DeviceStatus>() {
        Ok(status) => status,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    if let Err(e) = state.registry.update_status(id, status).await {
        return registry_error_response(e);
    }

    match state.registry.get(id).await {
        Ok(Some(device)) => (StatusCode::OK, Json(DeviceResponse::from(device))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "device not found"),
        Err(e) => registry_error_response(e),
    }
}

use std::collections::HashSet;

use lumen_core::{Device, DeviceId, DeviceKind, DeviceStatus};
use lumen_hub::registry::memory::InMemoryDeviceRegistry;
use lumen_hub::registry::sqlite::SqliteDeviceRegistry;
use lumen_hub::registry::{
    DeviceRegistry, RegistryError,
    filter::{DeviceFilter, DeviceSortBy, Pagination, QueryOptions, SortOrder},
};
use tempfile::NamedTempFile;

const BASE_MS: i64 = 1_700_000_000_000;

fn dummy_device(serial: &str, created_ms: i64) -> Device {
    let created_at = jiff::Timestamp::from_millisecond(created_ms).unwrap();
    Device {
        id: DeviceId::new(),
        name: format!("Device {serial}"),
        model: "X1".to_string(),
        serial_number: serial.to_string(),
        kind: DeviceKind::Lamp,
        status: DeviceStatus::Offline,
        firmware_version: Some("1.0.0".to_string()),
        ip_address: Some("192.168.1.10".parse().unwrap()),
        mqtt_topic: "lumen/devices".to_string(),
        last_message_received: None,
        created_at,
        updated_at: created_at,
        is_active: true,
    }
}

fn newest_first() -> QueryOptions<DeviceFilter> {
    QueryOptions {
        filter: DeviceFilter::default(),
        sort_by: DeviceSortBy::CreatedAt,
        sort_order: SortOrder::Desc,
        pagination: Pagination {
            offset: 0,
            limit: None,
        },
    }
}

// Memory registry tests

#[tokio::test]
async fn memory_register_and_get() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    let device = dummy_device("SN001", BASE_MS);
    let id = device.id;
    registry.register(device).await?;

    let fetched = registry.get(id).await?.expect("device should exist");
    assert_eq!(fetched.serial_number, "SN001");
    assert_eq!(fetched.status, DeviceStatus::Offline);
    assert!(!fetched.is_online());

    let by_serial = registry.get_by_serial("SN001").await?;
    assert_eq!(by_serial.map(|d| d.id), Some(id));

    Ok(())
}

#[tokio::test]
async fn memory_rejects_duplicate_serial() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    registry.register(dummy_device("SN001", BASE_MS)).await?;

    let result = registry.register(dummy_device("SN001", BASE_MS + 1)).await;
    assert!(matches!(result, Err(RegistryError::DuplicateSerial(sn)) if sn == "SN001"));

    assert_eq!(registry.count(None).await?, 1);
    Ok(())
}

#[tokio::test]
async fn memory_rejects_duplicate_id() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    let first = dummy_device("SN001", BASE_MS);
    let id = first.id;
    registry.register(first).await?;

    let mut second = dummy_device("SN002", BASE_MS + 1);
    second.id = id;

    let result = registry.register(second).await;
    assert!(matches!(result, Err(RegistryError::DuplicateId(_))));

    // The original record is untouched
    let surviving = registry.get(id).await?.unwrap();
    assert_eq!(surviving.serial_number, "SN001");
    assert_eq!(registry.count(None).await?, 1);

    Ok(())
}

#[tokio::test]
async fn memory_rejects_short_serial() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    let result = registry.register(dummy_device("AB", BASE_MS)).await;
    assert!(matches!(result, Err(RegistryError::SerialTooShort)));

    assert_eq!(registry.count(None).await?, 0);
    Ok(())
}

#[tokio::test]
async fn memory_update_status_and_touch() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    let device = dummy_device("SN001", BASE_MS);
    let id = device.id;
    registry.register(device).await?;

    registry.update_status(id, DeviceStatus::Online).await?;
    let fetched = registry.get(id).await?.unwrap();
    assert!(fetched.is_online());

    let at = jiff::Timestamp::from_millisecond(BASE_MS + 5_000).unwrap();
    registry.touch_last_message(id, at).await?;
    let fetched = registry.get(id).await?.unwrap();
    assert_eq!(fetched.last_message_received, Some(at));

    Ok(())
}

#[tokio::test]
async fn memory_update_status_unknown_device() {
    let registry = InMemoryDeviceRegistry::new();

    let result = registry
        .update_status(DeviceId::new(), DeviceStatus::Error)
        .await;
    assert!(matches!(result, Err(RegistryError::NotFound)));
}

#[tokio::test]
async fn memory_list_orders_newest_first() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    registry.register(dummy_device("SN001", BASE_MS)).await?;
    registry
        .register(dummy_device("SN002", BASE_MS + 1_000))
        .await?;
    registry
        .register(dummy_device("SN003", BASE_MS + 2_000))
        .await?;

    let devices = registry.list(newest_first()).await?;
    let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
    assert_eq!(serials, ["SN003", "SN002", "SN001"]);

    Ok(())
}

#[tokio::test]
async fn memory_list_filters_by_status() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    let online = dummy_device("SN001", BASE_MS);
    let online_id = online.id;
    registry.register(online).await?;
    registry.register(dummy_device("SN002", BASE_MS + 1)).await?;
    registry.update_status(online_id, DeviceStatus::Online).await?;

    let mut options = newest_first();
    options.filter.statuses = Some(HashSet::from([DeviceStatus::Online]));

    let devices = registry.list(options).await?;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].serial_number, "SN001");

    let offline_filter = DeviceFilter {
        statuses: Some(HashSet::from([DeviceStatus::Offline])),
        ..DeviceFilter::default()
    };
    assert_eq!(registry.count(Some(offline_filter)).await?, 1);

    Ok(())
}

#[tokio::test]
async fn memory_empty_filter_sets_match_everything() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    registry.register(dummy_device("SN001", BASE_MS)).await?;
    registry
        .register(dummy_device("SN002", BASE_MS + 1_000))
        .await?;

    let mut options = newest_first();
    options.filter.statuses = Some(HashSet::new());
    options.filter.kinds = Some(HashSet::new());

    assert_eq!(registry.list(options).await?.len(), 2);

    let filter = DeviceFilter {
        statuses: Some(HashSet::new()),
        ..DeviceFilter::default()
    };
    assert_eq!(registry.count(Some(filter)).await?, 2);

    Ok(())
}

#[tokio::test]
async fn memory_list_paginates() -> Result<(), RegistryError> {
    let registry = InMemoryDeviceRegistry::new();

    for i in 0..5 {
        registry
            .register(dummy_device(&format!("SN00{i}"), BASE_MS + i * 1_000))
            .await?;
    }

    let mut options = newest_first();
    options.pagination = Pagination {
        offset: 1,
        limit: Some(2),
    };

    let devices = registry.list(options).await?;
    let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
    assert_eq!(serials, ["SN003", "SN002"]);

    Ok(())
}

// SQLite registry tests

#[tokio::test]
async fn sqlite_register_and_get() -> Result<(), RegistryError> {
    let file = NamedTempFile::new().unwrap();
    let registry = SqliteDeviceRegistry::new(file.path()).await?;

    let device = dummy_device("SN001", BASE_MS);
    let id = device.id;
    registry.register(device.clone()).await?;

    let fetched = registry.get(id).await?.expect("device should exist");
    assert_eq!(fetched.serial_number, "SN001");
    assert_eq!(fetched.kind, DeviceKind::Lamp);
    assert_eq!(fetched.status, DeviceStatus::Offline);
    assert_eq!(fetched.ip_address, device.ip_address);
    assert_eq!(fetched.created_at, device.created_at);
    assert!(fetched.is_active);

    Ok(())
}

#[tokio::test]
async fn sqlite_rejects_duplicate_serial() -> Result<(), RegistryError> {
    let file = NamedTempFile::new().unwrap();
    let registry = SqliteDeviceRegistry::new(file.path()).await?;

    registry.register(dummy_device("SN001", BASE_MS)).await?;

    let result = registry.register(dummy_device("SN001", BASE_MS + 1)).await;
    assert!(matches!(result, Err(RegistryError::DuplicateSerial(_))));

    assert_eq!(registry.count(None).await?, 1);
    Ok(())
}

#[tokio::test]
async fn sqlite_rejects_duplicate_id() -> Result<(), RegistryError> {
    let file = NamedTempFile::new().unwrap();
    let registry = SqliteDeviceRegistry::new(file.path()).await?;

    let first = dummy_device("SN001", BASE_MS);
    let id = first.id;
    registry.register(first).await?;

    let mut second = dummy_device("SN002", BASE_MS + 1);
    second.id = id;

    let result = registry.register(second).await;
    assert!(matches!(result, Err(RegistryError::DuplicateId(_))));

    let surviving = registry.get(id).await?.unwrap();
    assert_eq!(surviving.serial_number, "SN001");
    assert_eq!(registry.count(None).await?, 1);

    Ok(())
}

#[tokio::test]
async fn sqlite_update_status_persists() -> Result<(), RegistryError> {
    let file = NamedTempFile::new().unwrap();
    let registry = SqliteDeviceRegistry::new(file.path()).await?;

    let device = dummy_device("SN001", BASE_MS);
    let id = device.id;
    registry.register(device).await?;

    registry.update_status(id, DeviceStatus::Maintenance).await?;

    let fetched = registry.get(id).await?.unwrap();
    assert_eq!(fetched.status, DeviceStatus::Maintenance);
    assert!(fetched.updated_at > fetched.created_at);

    let result = registry
        .update_status(DeviceId::new(), DeviceStatus::Online)
        .await;
    assert!(matches!(result, Err(RegistryError::NotFound)));

    Ok(())
}

#[tokio::test]
async fn sqlite_list_orders_newest_first() -> Result<(), RegistryError> {
    let file = NamedTempFile::new().unwrap();
    let registry = SqliteDeviceRegistry::new(file.path()).await?;

    registry.register(dummy_device("SN001", BASE_MS)).await?;
    registry
        .register(dummy_device("SN002", BASE_MS + 1_000))
        .await?;
    registry
        .register(dummy_device("SN003", BASE_MS + 2_000))
        .await?;

    let devices = registry.list(newest_first()).await?;
    let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
    assert_eq!(serials, ["SN003", "SN002", "SN001"]);

    Ok(())
}

#[tokio::test]
async fn sqlite_list_filters_and_paginates() -> Result<(), RegistryError> {
    let file = NamedTempFile::new().unwrap();
    let registry = SqliteDeviceRegistry::new(file.path()).await?;

    for i in 0..4 {
        registry
            .register(dummy_device(&format!("SN00{i}"), BASE_MS + i * 1_000))
            .await?;
    }

    let mut options = newest_first();
    options.filter.statuses = Some(HashSet::from([DeviceStatus::Offline]));
    options.pagination = Pagination {
        offset: 1,
        limit: Some(2),
    };

    let devices = registry.list(options).await?;
    let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
    assert_eq!(serials, ["SN002", "SN001"]);

    let online_filter = DeviceFilter {
        statuses: Some(HashSet::from([DeviceStatus::Online])),
        ..DeviceFilter::default()
    };
    assert_eq!(registry.count(Some(online_filter)).await?, 0);

    Ok(())
}

#[tokio::test]
async fn sqlite_touch_last_message() -> Result<(), RegistryError> {
    let file = NamedTempFile::new().unwrap();
    let registry = SqliteDeviceRegistry::new(file.path()).await?;

    let device = dummy_device("SN001", BASE_MS);
    let id = device.id;
    registry.register(device).await?;

    let at = jiff::Timestamp::from_millisecond(BASE_MS + 60_000).unwrap();
    registry.touch_last_message(id, at).await?;

    let fetched = registry.get(id).await?.unwrap();
    assert_eq!(fetched.last_message_received, Some(at));
    assert_eq!(fetched.updated_at, at);

    Ok(())
}

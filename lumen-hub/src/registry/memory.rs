use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use lumen_core::{Device, DeviceId, DeviceStatus, MIN_SERIAL_LEN};
use tokio::sync::RwLock;

use super::{
    DeviceRegistry, RegistryError,
    filter::{DeviceFilter, DeviceSortBy, Pagination, QueryOptions, SortOrder},
};

/// In-memory registry backend.
/// This is primarily intended for testing and as a reference
/// implementation of the DeviceRegistry trait.
#[derive(Clone, Default)]
pub struct InMemoryDeviceRegistry {
    devices: Arc<RwLock<HashMap<DeviceId, Device>>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn register(&self, device: Device) -> Result<(), RegistryError> {
        if device.serial_number.len() < MIN_SERIAL_LEN {
            return Err(RegistryError::SerialTooShort);
        }

        let mut devices = self.devices.write().await;

        if devices.contains_key(&device.id) {
            return Err(RegistryError::DuplicateId(device.id.0.to_string()));
        }

        if devices
            .values()
            .any(|d| d.serial_number == device.serial_number)
        {
            return Err(RegistryError::DuplicateSerial(device.serial_number));
        }

        devices.insert(device.id, device);
        Ok(())
    }

    async fn get(&self, id: DeviceId) -> Result<Option<Device>, RegistryError> {
        let devices = self.devices.read().await;
        Ok(devices.get(&id).cloned())
    }

    async fn get_by_serial(&self, serial: &str) -> Result<Option<Device>, RegistryError> {
        let devices = self.devices.read().await;
        Ok(devices.values().find(|d| d.serial_number == serial).cloned())
    }

    async fn update_status(&self, id: DeviceId, status: DeviceStatus) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().await;
        let device = devices.get_mut(&id).ok_or(RegistryError::NotFound)?;

        device.status = status;
        device.updated_at = jiff::Timestamp::now();
        Ok(())
    }

    async fn touch_last_message(
        &self,
        id: DeviceId,
        at: jiff::Timestamp,
    ) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().await;
        let device = devices.get_mut(&id).ok_or(RegistryError::NotFound)?;

        device.last_message_received = Some(at);
        device.updated_at = at;
        Ok(())
    }

    async fn list(&self, options: QueryOptions<DeviceFilter>) -> Result<Vec<Device>, RegistryError> {
        let devices = self.devices.read().await;
        let filtered: Vec<&Device> = filter_devices(&devices, &options.filter).collect();
        let sorted = sort_devices(filtered, &options.sort_by, &options.sort_order);
        Ok(paginate_devices(sorted, &options.pagination))
    }

    async fn count(&self, filter: Option<DeviceFilter>) -> Result<usize, RegistryError> {
        let devices = self.devices.read().await;
        if let Some(filter) = filter {
            return Ok(filter_devices(&devices, &filter).count());
        }
        Ok(devices.len())
    }
}

fn filter_devices<'a>(
    devices: &'a HashMap<DeviceId, Device>,
    filter: &'a DeviceFilter,
) -> impl Iterator<Item = &'a Device> {
    devices.values().filter(move |device| {
        // An empty set means no filter, matching the SQLite backend
        if let Some(statuses) = &filter.statuses
            && !statuses.is_empty()
            && !statuses.contains(&device.status)
        {
            return false;
        }

        if let Some(kinds) = &filter.kinds
            && !kinds.is_empty()
            && !kinds.contains(&device.kind)
        {
            return false;
        }

        if filter.active_only && !device.is_active {
            return false;
        }

        if let Some(after) = &filter.created_after
            && &device.created_at < after
        {
            return false;
        }

        if let Some(before) = &filter.created_before
            && &device.created_at > before
        {
            return false;
        }

        true
    })
}

fn sort_devices<'a>(
    mut devices: Vec<&'a Device>,
    sort_by: &DeviceSortBy,
    sort_order: &SortOrder,
) -> Vec<&'a Device> {
    match sort_by {
        DeviceSortBy::CreatedAt => devices.sort_by_key(|d| d.created_at),
        DeviceSortBy::UpdatedAt => devices.sort_by_key(|d| d.updated_at),
        DeviceSortBy::Name => devices.sort_by(|a, b| a.name.cmp(&b.name)),
        DeviceSortBy::SerialNumber => devices.sort_by(|a, b| a.serial_number.cmp(&b.serial_number)),
    }

    if matches!(sort_order, SortOrder::Desc) {
        devices.reverse();
    }

    devices
}

fn paginate_devices(devices: Vec<&Device>, pagination: &Pagination) -> Vec<Device> {
    let iter = devices.into_iter().skip(pagination.offset);
    match pagination.limit {
        Some(limit) => iter.take(limit).cloned().collect(),
        None => iter.cloned().collect(),
    }
}

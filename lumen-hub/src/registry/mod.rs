pub mod filter;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use lumen_core::{Device, DeviceId, DeviceStatus, MIN_SERIAL_LEN};

use self::filter::{DeviceFilter, QueryOptions};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("device not found")]
    NotFound,
    #[error("duplicate serial number: {0}")]
    DuplicateSerial(String),
    #[error("duplicate device id: {0}")]
    DuplicateId(String),
    #[error("serial number shorter than {} characters", MIN_SERIAL_LEN)]
    SerialTooShort,
    #[error("invalid device id: {0}")]
    InvalidId(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
    #[error("invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Persisted table of device records.
///
/// Backends must enforce serial number uniqueness and the minimum serial
/// length; status values are closed enums and cannot be invalid here.
#[async_trait]
pub trait DeviceRegistry: Clone + Send + Sync + 'static {
    /// Insert a new device record. Never replaces an existing one: both an
    /// id collision and a serial number collision are errors.
    async fn register(&self, device: Device) -> Result<(), RegistryError>;

    async fn get(&self, id: DeviceId) -> Result<Option<Device>, RegistryError>;

    async fn get_by_serial(&self, serial: &str) -> Result<Option<Device>, RegistryError>;

    /// Persist a new status and bump `updated_at`.
    async fn update_status(&self, id: DeviceId, status: DeviceStatus) -> Result<(), RegistryError>;

    /// Record the receipt time of the latest message from the device.
    async fn touch_last_message(
        &self,
        id: DeviceId,
        at: jiff::Timestamp,
    ) -> Result<(), RegistryError>;

    async fn list(&self, options: QueryOptions<DeviceFilter>) -> Result<Vec<Device>, RegistryError>;

    async fn count(&self, filter: Option<DeviceFilter>) -> Result<usize, RegistryError>;
}

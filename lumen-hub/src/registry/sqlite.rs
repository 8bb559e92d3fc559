use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use lumen_core::{Device, DeviceId, DeviceKind, DeviceStatus, MIN_SERIAL_LEN};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::{
    DeviceRegistry, RegistryError,
    filter::{DeviceFilter, DeviceSortBy, QueryOptions, SortOrder},
};

/// SQLite-backed registry. Timestamps are stored as unix milliseconds.
#[derive(Clone)]
pub struct SqliteDeviceRegistry {
    pool: SqlitePool,
}

impl SqliteDeviceRegistry {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let database_url = format!("sqlite:{}", path.as_ref().display());
        let pool = SqlitePool::connect(&database_url).await?;

        // enable WAL for better concurrency
        sqlx::query("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DeviceRegistry for SqliteDeviceRegistry {
    async fn register(&self, device: Device) -> Result<(), RegistryError> {
        if device.serial_number.len() < MIN_SERIAL_LEN {
            return Err(RegistryError::SerialTooShort);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO devices (
                id, name, model, serial_number, kind, status,
                firmware_version, ip_address, mqtt_topic,
                last_message_received, created_at, updated_at, is_active
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(device.id.0.to_string())
        .bind(&device.name)
        .bind(&device.model)
        .bind(&device.serial_number)
        .bind(device.kind.as_str())
        .bind(device.status.as_str())
        .bind(&device.firmware_version)
        .bind(device.ip_address.map(|ip| ip.to_string()))
        .bind(&device.mqtt_topic)
        .bind(device.last_message_received.map(|t| t.as_millisecond()))
        .bind(device.created_at.as_millisecond())
        .bind(device.updated_at.as_millisecond())
        .bind(device.is_active)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                // SQLite names the violated column as "devices.<column>"
                if db.message().contains("devices.id") {
                    Err(RegistryError::DuplicateId(device.id.0.to_string()))
                } else {
                    Err(RegistryError::DuplicateSerial(device.serial_number.clone()))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: DeviceId) -> Result<Option<Device>, RegistryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, model, serial_number, kind, status,
                   firmware_version, ip_address, mqtt_topic,
                   last_message_received, created_at, updated_at, is_active
            FROM devices
            WHERE id = ?
            "#,
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode_device(&r)).transpose()
    }

    async fn get_by_serial(&self, serial: &str) -> Result<Option<Device>, RegistryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, model, serial_number, kind, status,
                   firmware_version, ip_address, mqtt_topic,
                   last_message_received, created_at, updated_at, is_active
            FROM devices
            WHERE serial_number = ?
            "#,
        )
        .bind(serial)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode_device(&r)).transpose()
    }

    async fn update_status(&self, id: DeviceId, status: DeviceStatus) -> Result<(), RegistryError> {
        let result = sqlx::query("UPDATE devices SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(jiff::Timestamp::now().as_millisecond())
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound);
        }
        Ok(())
    }

    async fn touch_last_message(
        &self,
        id: DeviceId,
        at: jiff::Timestamp,
    ) -> Result<(), RegistryError> {
        let result =
            sqlx::query("UPDATE devices SET last_message_received = ?, updated_at = ? WHERE id = ?")
                .bind(at.as_millisecond())
                .bind(at.as_millisecond())
                .bind(id.0.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, options: QueryOptions<DeviceFilter>) -> Result<Vec<Device>, RegistryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, model, serial_number, kind, status, \
             firmware_version, ip_address, mqtt_topic, \
             last_message_received, created_at, updated_at, is_active \
             FROM devices",
        );
        push_filter(&mut qb, &options.filter);

        let column = match options.sort_by {
            DeviceSortBy::CreatedAt => "created_at",
            DeviceSortBy::UpdatedAt => "updated_at",
            DeviceSortBy::Name => "name",
            DeviceSortBy::SerialNumber => "serial_number",
        };
        let direction = match options.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(" ORDER BY ");
        qb.push(column);
        qb.push(" ");
        qb.push(direction);

        // LIMIT -1 means "no limit" in SQLite
        qb.push(" LIMIT ");
        qb.push_bind(options.pagination.limit.map_or(-1i64, |l| l as i64));
        qb.push(" OFFSET ");
        qb.push_bind(options.pagination.offset as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_device).collect()
    }

    async fn count(&self, filter: Option<DeviceFilter>) -> Result<usize, RegistryError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS count FROM devices");
        if let Some(filter) = &filter {
            push_filter(&mut qb, filter);
        }

        let row = qb.build().fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as usize)
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &DeviceFilter) {
    let mut prefix = " WHERE ";

    if let Some(statuses) = &filter.statuses
        && !statuses.is_empty()
    {
        qb.push(prefix);
        prefix = " AND ";
        qb.push("status IN (");
        {
            let mut sep = qb.separated(", ");
            for status in statuses {
                sep.push_bind(status.as_str());
            }
        }
        qb.push(")");
    }

    if let Some(kinds) = &filter.kinds
        && !kinds.is_empty()
    {
        qb.push(prefix);
        prefix = " AND ";
        qb.push("kind IN (");
        {
            let mut sep = qb.separated(", ");
            for kind in kinds {
                sep.push_bind(kind.as_str());
            }
        }
        qb.push(")");
    }

    if filter.active_only {
        qb.push(prefix);
        prefix = " AND ";
        qb.push("is_active = 1");
    }

    if let Some(after) = &filter.created_after {
        qb.push(prefix);
        prefix = " AND ";
        qb.push("created_at >= ");
        qb.push_bind(after.as_millisecond());
    }

    if let Some(before) = &filter.created_before {
        qb.push(prefix);
        qb.push("created_at <= ");
        qb.push_bind(before.as_millisecond());
    }
}

fn decode_device(row: &SqliteRow) -> Result<Device, RegistryError> {
    let raw_id: String = row.try_get("id")?;
    let id = Uuid::from_str(&raw_id).map_err(|_| RegistryError::InvalidId(raw_id))?;

    let raw_status: String = row.try_get("status")?;
    let status = DeviceStatus::from_str(&raw_status)
        .map_err(|_| RegistryError::InvalidValue("status", raw_status))?;

    let raw_kind: String = row.try_get("kind")?;
    let kind = DeviceKind::from_str(&raw_kind)
        .map_err(|_| RegistryError::InvalidValue("kind", raw_kind))?;

    let ip_address = row
        .try_get::<Option<String>, _>("ip_address")?
        .map(|raw| {
            IpAddr::from_str(&raw).map_err(|_| RegistryError::InvalidValue("ip_address", raw))
        })
        .transpose()?;

    let last_message_received = row
        .try_get::<Option<i64>, _>("last_message_received")?
        .map(|ms| {
            jiff::Timestamp::from_millisecond(ms).map_err(|_| RegistryError::InvalidTimestamp(ms))
        })
        .transpose()?;

    let created_at = decode_timestamp(row.try_get("created_at")?)?;
    let updated_at = decode_timestamp(row.try_get("updated_at")?)?;

    Ok(Device {
        id: DeviceId(id),
        name: row.try_get("name")?,
        model: row.try_get("model")?,
        serial_number: row.try_get("serial_number")?,
        kind,
        status,
        firmware_version: row.try_get("firmware_version")?,
        ip_address,
        mqtt_topic: row.try_get("mqtt_topic")?,
        last_message_received,
        created_at,
        updated_at,
        is_active: row.try_get("is_active")?,
    })
}

fn decode_timestamp(ms: i64) -> Result<jiff::Timestamp, RegistryError> {
    jiff::Timestamp::from_millisecond(ms).map_err(|_| RegistryError::InvalidTimestamp(ms))
}

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub Uuid);

impl DeviceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

/// An inventoried device record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub model: String,
    /// Unique across all records, at least [`MIN_SERIAL_LEN`] characters.
    pub serial_number: String,
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    pub firmware_version: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub mqtt_topic: String,
    pub last_message_received: Option<jiff::Timestamp>,
    pub created_at: jiff::Timestamp,
    pub updated_at: jiff::Timestamp,
    pub is_active: bool,
}

/// Minimum accepted serial number length.
pub const MIN_SERIAL_LEN: usize = 3;

impl Device {
    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Lamp,
    Sensor,
    Switch,
    Controller,
    Other,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lamp => "lamp",
            Self::Sensor => "sensor",
            Self::Switch => "switch",
            Self::Controller => "controller",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown device kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for DeviceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lamp" => Ok(Self::Lamp),
            "sensor" => Ok(Self::Sensor),
            "switch" => Ok(Self::Switch),
            "controller" => Ok(Self::Controller),
            "other" => Ok(Self::Other),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
    Maintenance,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Error => "error",
            Self::Maintenance => "maintenance",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown device status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for DeviceStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "error" => Ok(Self::Error),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Registration message published by a device when it comes up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAnnouncement {
    pub device_name: String,
    pub device_model: String,
    pub device_sn: String,
    pub device_init: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_device(status: DeviceStatus) -> Device {
        let now = jiff::Timestamp::now();
        Device {
            id: DeviceId::new(),
            name: "Lamp1".to_string(),
            model: "X1".to_string(),
            serial_number: "SN001".to_string(),
            kind: DeviceKind::Lamp,
            status,
            firmware_version: None,
            ip_address: None,
            mqtt_topic: "lumen/devices".to_string(),
            last_message_received: None,
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }

    #[test]
    fn status_parses_all_four_values() {
        assert_eq!("online".parse::<DeviceStatus>().unwrap(), DeviceStatus::Online);
        assert_eq!("offline".parse::<DeviceStatus>().unwrap(), DeviceStatus::Offline);
        assert_eq!("error".parse::<DeviceStatus>().unwrap(), DeviceStatus::Error);
        assert_eq!(
            "maintenance".parse::<DeviceStatus>().unwrap(),
            DeviceStatus::Maintenance
        );
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert!("rebooting".parse::<DeviceStatus>().is_err());
        assert!("Online".parse::<DeviceStatus>().is_err());
        assert!("".parse::<DeviceStatus>().is_err());
    }

    #[test]
    fn kind_roundtrips_through_wire_names() {
        for kind in [
            DeviceKind::Lamp,
            DeviceKind::Sensor,
            DeviceKind::Switch,
            DeviceKind::Controller,
            DeviceKind::Other,
        ] {
            assert_eq!(kind.as_str().parse::<DeviceKind>().unwrap(), kind);
        }
        assert!("toaster".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn is_online_only_when_status_is_online() {
        assert!(dummy_device(DeviceStatus::Online).is_online());
        assert!(!dummy_device(DeviceStatus::Offline).is_online());
        assert!(!dummy_device(DeviceStatus::Error).is_online());
        assert!(!dummy_device(DeviceStatus::Maintenance).is_online());
    }

    #[test]
    fn announcement_wire_contract() {
        let raw = r#"{"device_name":"Lamp1","device_model":"X1","device_sn":"SN001","device_init":true}"#;
        let announcement: DeviceAnnouncement = serde_json::from_str(raw).unwrap();

        assert_eq!(announcement.device_name, "Lamp1");
        assert_eq!(announcement.device_model, "X1");
        assert_eq!(announcement.device_sn, "SN001");
        assert!(announcement.device_init);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&DeviceStatus::Maintenance).unwrap();
        assert_eq!(json, r#""maintenance""#);
    }
}

//! Device inventory traits
//!
//! Abstracts the live list of attached devices so the resolver can run
//! against adb/simctl in production and an in-memory list in tests.

use async_trait::async_trait;
use std::fmt;

use crate::profile::Platform;

/// Readiness reported by the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Booted and accepting sessions
    Ready,
    /// Attached but still starting up
    Booting,
    /// Attached but unreachable
    Offline,
    /// Attached but the host is not authorized (adb)
    Unauthorized,
    /// Anything else the tool reported
    Unknown(String),
}

impl DeviceStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, DeviceStatus::Ready)
    }

    /// Whether a session could eventually be started on the device
    pub fn is_usable(&self) -> bool {
        !matches!(self, DeviceStatus::Offline | DeviceStatus::Unauthorized)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Ready => f.write_str("ready"),
            DeviceStatus::Booting => f.write_str("booting"),
            DeviceStatus::Offline => f.write_str("offline"),
            DeviceStatus::Unauthorized => f.write_str("unauthorized"),
            DeviceStatus::Unknown(s) => write!(f, "unknown ({})", s),
        }
    }
}

/// One entry of the live device inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryDevice {
    /// Serial or UDID
    pub device_id: String,
    pub platform: Platform,
    /// OS version as reported by the device
    pub version: String,
    pub status: DeviceStatus,
    /// Human-readable model or simulator name
    pub name: Option<String>,
}

impl InventoryDevice {
    pub fn new<S: Into<String>, V: Into<String>>(
        device_id: S,
        platform: Platform,
        version: V,
        status: DeviceStatus,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            platform,
            version: version.into(),
            status,
            name: None,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Live device inventory
///
/// Read-only; safe to call from concurrent workers.
#[async_trait]
pub trait DeviceInventory: Send + Sync + fmt::Debug {
    /// Enumerate attached devices in a stable order
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>, crate::Error>;
}

//! In-memory device inventory
//!
//! Used by tests and dry runs in place of adb/simctl.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::device::traits::{DeviceInventory, InventoryDevice};
use crate::Error;

/// Fixed device list
#[derive(Debug, Default)]
pub struct StaticInventory {
    devices: RwLock<Vec<InventoryDevice>>,
    queries: AtomicUsize,
    fail_with: RwLock<Option<String>>,
}

impl StaticInventory {
    pub fn new(devices: Vec<InventoryDevice>) -> Self {
        Self {
            devices: RwLock::new(devices),
            queries: AtomicUsize::new(0),
            fail_with: RwLock::new(None),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the device list
    pub fn set_devices(&self, devices: Vec<InventoryDevice>) {
        if let Ok(mut guard) = self.devices.write() {
            *guard = devices;
        }
    }

    /// Make subsequent queries fail
    pub fn fail_with<S: Into<String>>(&self, message: S) {
        if let Ok(mut guard) = self.fail_with.write() {
            *guard = Some(message.into());
        }
    }

    /// Number of `list_devices` calls so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceInventory for StaticInventory {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>, Error> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self
            .fail_with
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .clone()
        {
            return Err(Error::inventory(message));
        }

        self.devices
            .read()
            .map(|devices| devices.clone())
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))
    }
}

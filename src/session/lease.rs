//! Device leases
//!
//! A lease is an exclusive claim on a device id held by a live session.
//! Acquiring a lease on a busy device fails immediately with `DeviceBusy`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

use crate::{Error, Result};

static SHARED_LEASES: OnceLock<Arc<DeviceLeases>> = OnceLock::new();

/// Registry of devices that currently have a live session
#[derive(Debug, Default)]
pub struct DeviceLeases {
    busy: Mutex<HashSet<String>>,
}

impl DeviceLeases {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registry shared by every manager in the process
    pub fn shared() -> Arc<Self> {
        SHARED_LEASES.get_or_init(Self::new).clone()
    }

    /// Claim a device, failing fast if it is already claimed
    pub fn acquire(self: &Arc<Self>, device_id: &str) -> Result<DeviceLease> {
        let mut busy = self
            .busy
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;

        if !busy.insert(device_id.to_string()) {
            return Err(Error::device_busy(device_id));
        }

        debug!("Leased device {}", device_id);
        Ok(DeviceLease {
            device_id: device_id.to_string(),
            registry: self.clone(),
        })
    }

    pub fn is_busy(&self, device_id: &str) -> bool {
        self.busy
            .lock()
            .map(|busy| busy.contains(device_id))
            .unwrap_or(false)
    }

    /// Number of devices currently leased
    pub fn busy_count(&self) -> usize {
        self.busy.lock().map(|busy| busy.len()).unwrap_or(0)
    }

    fn release(&self, device_id: &str) {
        // release even when poisoned
        let mut busy = match self.busy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if busy.remove(device_id) {
            debug!("Released device {}", device_id);
        }
    }
}

/// Exclusive claim on one device, released on drop
#[derive(Debug)]
pub struct DeviceLease {
    device_id: String,
    registry: Arc<DeviceLeases>,
}

impl DeviceLease {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.registry.release(&self.device_id);
    }
}

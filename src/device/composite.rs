//! Inventory that concatenates several sources

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::device::traits::{DeviceInventory, InventoryDevice};
use crate::Error;

/// Queries each child in order and concatenates the results
///
/// A failing child (tool missing, timeout) is logged and skipped so that an
/// Android-only host still resolves without Xcode installed.
#[derive(Debug, Default)]
pub struct CompositeInventory {
    sources: Vec<Arc<dyn DeviceInventory>>,
}

impl CompositeInventory {
    pub fn new(sources: Vec<Arc<dyn DeviceInventory>>) -> Self {
        Self { sources }
    }

    pub fn push(&mut self, source: Arc<dyn DeviceInventory>) {
        self.sources.push(source);
    }
}

#[async_trait]
impl DeviceInventory for CompositeInventory {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>, Error> {
        let mut devices = Vec::new();
        for source in &self.sources {
            match source.list_devices().await {
                Ok(found) => devices.extend(found),
                Err(e) => warn!("Skipping device source {:?}: {}", source, e),
            }
        }
        Ok(devices)
    }
}

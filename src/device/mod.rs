//! # Device resolution
//!
//! Maps a device request (`--device=<profile_id>` or `--device=auto_detect`)
//! onto a concrete attached device.
//!
//! ## Modules
//! - `traits`: the `DeviceInventory` capability and inventory records
//! - `adb`: Android devices and emulators via `adb`
//! - `simctl`: iOS simulators via `xcrun simctl`
//! - `composite`: several inventories queried in order
//! - `mock`: in-memory inventory
//! - `resolver`: profile / auto-detect resolution
//!
//! ## Tie-break
//! When several attached devices satisfy a profile the first one in inventory
//! enumeration order wins. The choice is deterministic, never random.

pub mod traits;
pub mod adb;
pub mod simctl;
pub mod composite;
pub mod mock;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use traits::{DeviceInventory, DeviceStatus, InventoryDevice};
pub use adb::AdbInventory;
pub use simctl::SimctlInventory;
pub use composite::CompositeInventory;
pub use mock::StaticInventory;
pub use resolver::{version_matches, DeviceRequest, DeviceResolver, ResolvedDevice};

use std::sync::Arc;

use crate::config::Config;

/// Host inventory: adb devices followed by iOS simulators
pub fn host_inventory(config: &Config) -> CompositeInventory {
    CompositeInventory::new(vec![
        Arc::new(AdbInventory::new(&config.adb_path, config.inventory_timeout())),
        Arc::new(SimctlInventory::new(&config.xcrun_path, config.inventory_timeout())),
    ])
}

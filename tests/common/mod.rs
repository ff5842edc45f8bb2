//! Common test utilities
//!
//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use device_oxide::device::{
    DeviceResolver, DeviceStatus, InventoryDevice, ResolvedDevice, StaticInventory,
};
use device_oxide::driver::AutomationDriver;
use device_oxide::profile::{Platform, ProfileStore};
use device_oxide::retry::{Backoff, RetryPolicy};
use device_oxide::session::{DeviceLeases, SessionManager};
use std::sync::Arc;
use std::time::Duration;

/// Android emulator in the given state
pub fn emulator(serial: &str, version: &str, status: DeviceStatus) -> InventoryDevice {
    InventoryDevice::new(serial, Platform::Android, version, status).with_name("sdk_gphone64_x86_64")
}

/// Booted iOS simulator
pub fn simulator(udid: &str, version: &str) -> InventoryDevice {
    InventoryDevice::new(udid, Platform::IOS, version, DeviceStatus::Ready).with_name("iPhone 15 Pro")
}

/// Resolver over the built-in catalogue and a fixed inventory
pub fn resolver(devices: Vec<InventoryDevice>) -> (DeviceResolver, Arc<StaticInventory>) {
    let inventory = Arc::new(StaticInventory::new(devices));
    let resolver =
        DeviceResolver::new(Arc::new(ProfileStore::builtin()), inventory.clone()).verify_app(false);
    (resolver, inventory)
}

/// Manager with its own lease registry, fast backoff and short timeouts
pub fn manager(driver: Arc<dyn AutomationDriver>, max_attempts: u32) -> SessionManager {
    SessionManager::new(driver)
        .with_leases(DeviceLeases::new())
        .with_policy(RetryPolicy::new(
            max_attempts,
            Backoff::Fixed(Duration::from_millis(5)),
        ))
        .with_timeouts(
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
}

/// Resolve `request` against `devices`, panicking on failure
pub async fn resolve(devices: Vec<InventoryDevice>, request: &str) -> ResolvedDevice {
    let (resolver, _) = resolver(devices);
    resolver
        .resolve_str(request)
        .await
        .unwrap_or_else(|e| panic!("resolving {} failed: {}", request, e))
}

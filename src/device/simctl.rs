//! iOS simulator inventory backed by `xcrun simctl`

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::device::traits::{DeviceInventory, DeviceStatus, InventoryDevice};
use crate::profile::Platform;
use crate::Error;

#[derive(Debug, Deserialize)]
struct SimctlList {
    devices: BTreeMap<String, Vec<SimctlDevice>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimctlDevice {
    udid: String,
    name: String,
    state: String,
    #[serde(default = "default_available")]
    is_available: bool,
}

fn default_available() -> bool {
    true
}

/// Lists iOS simulators through `xcrun simctl`
#[derive(Debug, Clone)]
pub struct SimctlInventory {
    xcrun_path: String,
    timeout: Duration,
}

impl SimctlInventory {
    pub fn new<S: Into<String>>(xcrun_path: S, timeout: Duration) -> Self {
        Self {
            xcrun_path: xcrun_path.into(),
            timeout,
        }
    }
}

/// Extract the iOS version from a runtime identifier
///
/// `com.apple.CoreSimulator.SimRuntime.iOS-17-5` -> `17.5`
pub fn runtime_version(runtime: &str) -> Option<String> {
    let suffix = runtime.rsplit('.').next()?;
    let version = suffix.strip_prefix("iOS-")?;
    Some(version.replace('-', "."))
}

/// Parse `xcrun simctl list devices --json` output
///
/// Non-iOS runtimes (watchOS, tvOS) and unavailable simulators are skipped.
pub fn parse_simctl_devices(json: &str) -> Result<Vec<InventoryDevice>, Error> {
    let list: SimctlList = serde_json::from_str(json)?;

    let mut devices = Vec::new();
    for (runtime, sims) in list.devices {
        let Some(version) = runtime_version(&runtime) else {
            continue;
        };
        for sim in sims.into_iter().filter(|s| s.is_available) {
            let status = match sim.state.as_str() {
                "Booted" => DeviceStatus::Ready,
                "Booting" => DeviceStatus::Booting,
                "Shutdown" | "Shutting Down" => DeviceStatus::Offline,
                other => DeviceStatus::Unknown(other.to_string()),
            };
            devices.push(
                InventoryDevice::new(sim.udid, Platform::IOS, version.clone(), status)
                    .with_name(sim.name),
            );
        }
    }
    Ok(devices)
}

#[async_trait]
impl DeviceInventory for SimctlInventory {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>, Error> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.xcrun_path)
                .args(["simctl", "list", "devices", "--json"])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::timeout("xcrun simctl list devices"))?
        .map_err(|e| Error::inventory(format!("Failed to run {}: {}", self.xcrun_path, e)))?;

        if !output.status.success() {
            return Err(Error::inventory(format!(
                "simctl exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let devices = parse_simctl_devices(&String::from_utf8_lossy(&output.stdout))?;
        debug!("simctl reported {} simulator(s)", devices.len());
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMCTL_JSON: &str = r#"{
      "devices": {
        "com.apple.CoreSimulator.SimRuntime.iOS-17-5": [
          {"udid": "AAAA-1111", "name": "iPhone 15 Pro", "state": "Booted", "isAvailable": true},
          {"udid": "AAAA-2222", "name": "iPhone 15", "state": "Shutdown", "isAvailable": true},
          {"udid": "AAAA-3333", "name": "iPhone SE", "state": "Booted", "isAvailable": false}
        ],
        "com.apple.CoreSimulator.SimRuntime.watchOS-10-5": [
          {"udid": "WWWW-1111", "name": "Apple Watch", "state": "Booted", "isAvailable": true}
        ],
        "com.apple.CoreSimulator.SimRuntime.iOS-18-0": [
          {"udid": "BBBB-1111", "name": "iPhone 16", "state": "Booting"}
        ]
      }
    }"#;

    #[test]
    fn test_runtime_version() {
        assert_eq!(
            runtime_version("com.apple.CoreSimulator.SimRuntime.iOS-17-5"),
            Some("17.5".to_string())
        );
        assert_eq!(
            runtime_version("com.apple.CoreSimulator.SimRuntime.iOS-18-0"),
            Some("18.0".to_string())
        );
        assert_eq!(runtime_version("com.apple.CoreSimulator.SimRuntime.tvOS-17-0"), None);
    }

    #[test]
    fn test_parse_simctl_devices() {
        let devices = parse_simctl_devices(SIMCTL_JSON).unwrap();
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].device_id, "AAAA-1111");
        assert_eq!(devices[0].version, "17.5");
        assert_eq!(devices[0].status, DeviceStatus::Ready);
        assert_eq!(devices[0].name.as_deref(), Some("iPhone 15 Pro"));

        assert_eq!(devices[1].status, DeviceStatus::Offline);

        assert_eq!(devices[2].device_id, "BBBB-1111");
        assert_eq!(devices[2].version, "18.0");
        assert_eq!(devices[2].status, DeviceStatus::Booting);
        assert!(devices.iter().all(|d| d.platform == Platform::IOS));
    }

    #[test]
    fn test_parse_simctl_invalid_json() {
        assert!(matches!(
            parse_simctl_devices("not json"),
            Err(Error::Serialization(_))
        ));
    }
}

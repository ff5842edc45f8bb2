//! Android device inventory backed by `adb`

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::device::traits::{DeviceInventory, DeviceStatus, InventoryDevice};
use crate::profile::Platform;
use crate::Error;

/// Lists Android emulators and devices through `adb`
#[derive(Debug, Clone)]
pub struct AdbInventory {
    adb_path: String,
    timeout: Duration,
}

impl AdbInventory {
    pub fn new<S: Into<String>>(adb_path: S, timeout: Duration) -> Self {
        Self {
            adb_path: adb_path.into(),
            timeout,
        }
    }

    /// Run adb and return stdout
    async fn run(&self, args: &[&str]) -> Result<String, Error> {
        debug!("Running {} {}", self.adb_path, args.join(" "));

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.adb_path).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| Error::timeout(format!("{} {}", self.adb_path, args.join(" "))))?
        .map_err(|e| Error::inventory(format!("Failed to run {}: {}", self.adb_path, e)))?;

        if !output.status.success() {
            return Err(Error::inventory(format!(
                "{} {} exited with {}: {}",
                self.adb_path,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn getprop(&self, serial: &str, prop: &str) -> Result<String, Error> {
        let out = self.run(&["-s", serial, "shell", "getprop", prop]).await?;
        Ok(out.trim().to_string())
    }

    /// Query version, boot state and model of a connected device
    async fn describe(&self, serial: &str) -> InventoryDevice {
        let version = self
            .getprop(serial, "ro.build.version.release")
            .await
            .unwrap_or_default();

        let status = match self.getprop(serial, "sys.boot_completed").await {
            Ok(flag) if flag == "1" => DeviceStatus::Ready,
            Ok(_) => DeviceStatus::Booting,
            Err(e) => {
                warn!("Could not read boot state of {}: {}", serial, e);
                DeviceStatus::Booting
            }
        };

        let mut device = InventoryDevice::new(serial, Platform::Android, version, status);
        if let Ok(model) = self.getprop(serial, "ro.product.model").await {
            if !model.is_empty() {
                device = device.with_name(model);
            }
        }
        device
    }
}

/// Parse `adb devices` output into (serial, state) pairs
pub fn parse_adb_devices(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some((serial.to_string(), state.to_string()))
        })
        .collect()
}

#[async_trait]
impl DeviceInventory for AdbInventory {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>, Error> {
        let output = self.run(&["devices"]).await?;

        let mut devices = Vec::new();
        for (serial, state) in parse_adb_devices(&output) {
            let device = match state.as_str() {
                "device" => self.describe(&serial).await,
                "offline" => {
                    InventoryDevice::new(serial, Platform::Android, "", DeviceStatus::Offline)
                }
                "unauthorized" => {
                    InventoryDevice::new(serial, Platform::Android, "", DeviceStatus::Unauthorized)
                }
                other => InventoryDevice::new(
                    serial,
                    Platform::Android,
                    "",
                    DeviceStatus::Unknown(other.to_string()),
                ),
            };
            devices.push(device);
        }

        debug!("adb reported {} device(s)", devices.len());
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adb_devices() {
        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      List of devices attached\n\
                      emulator-5554\tdevice\n\
                      R58M123ABC\tunauthorized\n\
                      emulator-5556\toffline\n\
                      \n";

        let devices = parse_adb_devices(output);
        assert_eq!(
            devices,
            vec![
                ("emulator-5554".to_string(), "device".to_string()),
                ("R58M123ABC".to_string(), "unauthorized".to_string()),
                ("emulator-5556".to_string(), "offline".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_adb_devices_long_format() {
        let output = "List of devices attached\n\
                      emulator-5554          device product:sdk_gphone64 model:Pixel_6 transport_id:1\n";
        let devices = parse_adb_devices(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].1, "device");
    }

    #[test]
    fn test_parse_adb_devices_empty() {
        assert!(parse_adb_devices("List of devices attached\n\n").is_empty());
    }

    #[tokio::test]
    async fn test_missing_adb_binary() {
        let inventory = AdbInventory::new("/nonexistent/adb", Duration::from_secs(1));
        let result = inventory.list_devices().await;
        assert!(matches!(result, Err(Error::Inventory(_))));
    }
}

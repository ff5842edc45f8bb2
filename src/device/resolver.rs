//! Device resolver
//!
//! Turns a profile id or `auto_detect` into a concrete attached device and the
//! capability set used to start a session on it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::device::traits::{DeviceInventory, InventoryDevice};
use crate::profile::{Capabilities, CapabilityProfile, Platform, ProfileStore, AUTO_DETECT};
use crate::{Error, Result};

/// What the caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    /// A named profile
    Profile(String),
    /// First ready device, optionally restricted to one platform
    AutoDetect { platform: Option<Platform> },
}

impl DeviceRequest {
    pub fn auto_detect() -> Self {
        DeviceRequest::AutoDetect { platform: None }
    }

    /// Restrict an auto-detect request to one platform; profiles are unaffected
    pub fn with_platform(self, platform: Option<Platform>) -> Self {
        match self {
            DeviceRequest::AutoDetect { .. } => DeviceRequest::AutoDetect { platform },
            other => other,
        }
    }
}

impl FromStr for DeviceRequest {
    type Err = Error;

    /// Accepts `--device=<id>`, `device=<id>` or a bare value
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        let value = value
            .strip_prefix("--device=")
            .or_else(|| value.strip_prefix("device="))
            .unwrap_or(value)
            .trim();

        match value {
            "" | AUTO_DETECT | "default" => Ok(DeviceRequest::auto_detect()),
            id if id.starts_with('-') => Err(Error::configuration(format!(
                "Invalid device request: {}",
                s
            ))),
            id => Ok(DeviceRequest::Profile(id.to_string())),
        }
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRequest::Profile(id) => f.write_str(id),
            DeviceRequest::AutoDetect { platform: None } => f.write_str(AUTO_DETECT),
            DeviceRequest::AutoDetect {
                platform: Some(platform),
            } => write!(f, "{} ({})", AUTO_DETECT, platform),
        }
    }
}

/// Concrete device chosen for a request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDevice {
    /// Serial or UDID of the attached device
    pub device_id: String,
    pub platform: Platform,
    /// OS version reported by the device
    pub version: String,
    pub name: Option<String>,
    /// Profile the device was resolved from, or `auto_detect`
    pub profile_id: String,
    /// Merged capabilities for session start
    pub capabilities: Capabilities,
}

/// Whether `actual` satisfies a dotted numeric version constraint
///
/// Every component of the constraint must equal the corresponding component
/// of the actual version, where missing components count as zero: `13`
/// matches `13.0.1`, `13.0` matches `13`, `13.0` does not match `13.1`.
pub fn version_matches(constraint: &str, actual: &str) -> bool {
    fn components(v: &str) -> Option<Vec<u64>> {
        v.trim().split('.').map(|part| part.parse().ok()).collect()
    }

    match (components(constraint), components(actual)) {
        (Some(want), Some(have)) => want
            .iter()
            .enumerate()
            .all(|(i, w)| have.get(i).copied().unwrap_or(0) == *w),
        _ => constraint.trim().eq_ignore_ascii_case(actual.trim()),
    }
}

/// Resolves device requests against the live inventory
#[derive(Debug, Clone)]
pub struct DeviceResolver {
    store: Arc<ProfileStore>,
    inventory: Arc<dyn DeviceInventory>,
    verify_app: bool,
}

impl DeviceResolver {
    pub fn new(store: Arc<ProfileStore>, inventory: Arc<dyn DeviceInventory>) -> Self {
        Self {
            store,
            inventory,
            verify_app: true,
        }
    }

    /// Toggle the app-exists check applied when building capabilities
    pub fn verify_app(mut self, verify: bool) -> Self {
        self.verify_app = verify;
        self
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    /// Resolve a CLI-style request string
    pub async fn resolve_str(&self, request: &str) -> Result<ResolvedDevice> {
        let request: DeviceRequest = request.parse()?;
        self.resolve(&request).await
    }

    /// Pick a concrete device for the request
    pub async fn resolve(&self, request: &DeviceRequest) -> Result<ResolvedDevice> {
        match request {
            DeviceRequest::Profile(id) => self.resolve_profile(id).await,
            DeviceRequest::AutoDetect { platform } => self.resolve_auto(*platform).await,
        }
    }

    async fn resolve_profile(&self, id: &str) -> Result<ResolvedDevice> {
        let profile = self.store.get_profile(id)?;
        let devices = self.inventory.list_devices().await?;
        debug!("Resolving profile {} against {} device(s)", id, devices.len());

        let device = devices
            .into_iter()
            .filter(|d| d.platform == profile.platform && d.status.is_usable())
            .find(|d| match profile.version_constraint() {
                Some(want) => version_matches(want, &d.version),
                None => true,
            })
            .ok_or_else(|| Error::NoMatchingDevice {
                profile: id.to_string(),
                platform: profile.platform.to_string(),
                version: profile
                    .version_constraint()
                    .unwrap_or("any version")
                    .to_string(),
            })?;

        info!(
            "Profile {} resolved to {} ({} {}, {})",
            id, device.device_id, device.platform, device.version, device.status
        );
        self.build(profile, device)
    }

    async fn resolve_auto(&self, platform: Option<Platform>) -> Result<ResolvedDevice> {
        let devices = self.inventory.list_devices().await?;
        if devices.is_empty() {
            return Err(Error::no_device_available("device inventory is empty"));
        }

        let total = devices.len();
        let device = devices
            .into_iter()
            .filter(|d| platform.map_or(true, |p| d.platform == p))
            .find(|d| d.status.is_ready())
            .ok_or_else(|| {
                Error::no_device_available(match platform {
                    Some(p) => format!("none of {} device(s) is a ready {} device", total, p),
                    None => format!("none of {} device(s) reports ready", total),
                })
            })?;

        info!(
            "Auto-detected {} ({} {})",
            device.device_id, device.platform, device.version
        );

        let fallback;
        let template = match self.store.auto_detect_template(device.platform) {
            Some(template) => template,
            None => {
                fallback = CapabilityProfile::new(AUTO_DETECT, device.platform);
                &fallback
            }
        };
        self.build(template, device)
    }

    /// Merge runtime device properties into the profile's capabilities
    fn build(&self, profile: &CapabilityProfile, device: InventoryDevice) -> Result<ResolvedDevice> {
        let mut capabilities = profile.capabilities(self.store.common(), self.verify_app)?;

        capabilities.set("udid", device.device_id.as_str());
        if !device.version.is_empty() {
            capabilities.set("platformVersion", device.version.as_str());
        }
        if profile.device_name.is_none() {
            let name = device.name.as_deref().unwrap_or(&device.device_id);
            capabilities.set("deviceName", name);
        }

        Ok(ResolvedDevice {
            device_id: device.device_id,
            platform: device.platform,
            version: device.version,
            name: device.name.or_else(|| profile.device_name.clone()),
            profile_id: profile.id.clone(),
            capabilities,
        })
    }
}

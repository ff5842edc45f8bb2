//! Capability profile store
//!
//! Holds the named device configurations. Loaded once, read-only afterwards.
//!
//! Relative `app` paths in a profile file resolve against the file's
//! directory. The built-in catalogue's relative paths resolve against the
//! working directory unless an app root is applied with
//! [`ProfileStore::with_app_root`] (or `DEVICE_OXIDE_APP_ROOT` for the
//! global store).

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use super::types::{Capabilities, CapabilityProfile, Platform};
use crate::{Error, Result};

/// Request alias that means "pick any ready device"
pub const AUTO_DETECT: &str = "auto_detect";

static GLOBAL_STORE: OnceLock<Arc<ProfileStore>> = OnceLock::new();

/// Environment variable naming a TOML profile file for the global store
pub const PROFILES_ENV: &str = "DEVICE_OXIDE_PROFILES";

/// Environment variable naming the directory relative app paths resolve against
pub const APP_ROOT_ENV: &str = "DEVICE_OXIDE_APP_ROOT";

/// On-disk layout of a profile file
#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    common: Capabilities,
    #[serde(default)]
    profile: Vec<CapabilityProfile>,
    #[serde(default)]
    auto_detect: Vec<CapabilityProfile>,
}

/// Read-only collection of capability profiles
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    common: Capabilities,
    profiles: Vec<CapabilityProfile>,
    index: HashMap<String, usize>,
    auto_detect: HashMap<Platform, CapabilityProfile>,
}

impl ProfileStore {
    /// Build a store from explicit parts; later duplicates of an id are rejected
    pub fn new(
        common: Capabilities,
        profiles: Vec<CapabilityProfile>,
        auto_detect: Vec<CapabilityProfile>,
    ) -> Result<Self> {
        let mut seen = HashSet::with_capacity(profiles.len());
        for profile in &profiles {
            if profile.id.is_empty() {
                return Err(Error::configuration("Profile without id"));
            }
            if profile.id == AUTO_DETECT || profile.id == "default" {
                return Err(Error::configuration(format!(
                    "Profile id '{}' is reserved",
                    profile.id
                )));
            }
            if !seen.insert(profile.id.as_str()) {
                return Err(Error::configuration(format!(
                    "Duplicate profile id: {}",
                    profile.id
                )));
            }
        }

        Ok(Self::assemble(common, profiles, auto_detect))
    }

    fn assemble(
        common: Capabilities,
        profiles: Vec<CapabilityProfile>,
        auto_detect: Vec<CapabilityProfile>,
    ) -> Self {
        let index = profiles
            .iter()
            .enumerate()
            .map(|(pos, profile)| (profile.id.clone(), pos))
            .collect();

        let mut templates = HashMap::new();
        for mut template in auto_detect {
            if template.id.is_empty() {
                template.id = AUTO_DETECT.to_string();
            }
            templates.insert(template.platform, template);
        }

        Self {
            common,
            profiles,
            index,
            auto_detect: templates,
        }
    }

    /// Parse a TOML profile file
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ProfileFile = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse profiles: {}", e)))?;
        Self::new(file.common, file.profile, file.auto_detect)
    }

    /// Load a TOML profile file from disk
    ///
    /// Relative app paths are resolved against the file's directory.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read profiles file: {}", e)))?;
        let file = Path::new(path);
        let file = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
        let base = file.parent().unwrap_or_else(|| Path::new("."));

        let store = Self::from_toml(&content)?.with_app_root(base);
        info!("Loaded {} profile(s) from {}", store.profiles.len(), path);
        Ok(store)
    }

    /// Resolve relative app paths against `root`; absolute paths are kept
    pub fn with_app_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        for profile in self.profiles.iter_mut().chain(self.auto_detect.values_mut()) {
            if let Some(app) = profile.app.as_mut() {
                if app.is_relative() {
                    let rebased = root.join(&*app);
                    debug!("App for {} resolves to {}", profile.id, rebased.display());
                    *app = rebased;
                }
            }
        }
        self
    }

    /// Built-in catalogue for the SwagLabs sample app
    pub fn builtin() -> Self {
        let mut common = Capabilities::new();
        common.set("noReset", false);
        common.set("fullReset", false);
        common.set("newCommandTimeout", 300i64);
        common.set("launchTimeout", 90000i64);
        common.set("deviceReadyTimeout", 90i64);
        common.set("androidDeviceReadyTimeout", 90i64);
        common.set("iosInstallPause", 8000i64);
        common.set("androidInstallTimeout", 90000i64);
        common.set("autoGrantPermissions", true);
        common.set("autoAcceptAlerts", true);
        common.set("autoDismissAlerts", true);
        common.set("forceAppLaunch", true);
        common.set("shouldTerminateApp", true);

        let android_app = "apps/android/Android.SauceLabs.Mobile.Sample.app.2.7.1.apk";
        let android = |id: &str, version: &str, name: &str| {
            CapabilityProfile::new(id, Platform::Android)
                .with_version(version)
                .with_device_name(name)
                .with_automation("UiAutomator2")
                .with_app(android_app)
                .with_option("appPackage", "com.swaglabsmobileapp")
                .with_option("appActivity", "com.swaglabsmobileapp.MainActivity")
        };

        let profiles = vec![
            android("pixel_3a_api_36", "16", "Pixel_3a_API_36")
                .with_option("ensureWebviewsHavePages", true)
                .with_option("nativeWebScreenshot", true)
                .with_option("connectHardwareKeyboard", true),
            android("pixel_6_api_33", "13", "Pixel_6_API_33"),
            CapabilityProfile::new("iphone_15_pro_ios_17.5", Platform::IOS)
                .with_version("17.5")
                .with_device_name("iPhone 15 Pro")
                .with_automation("XCUITest")
                .with_app("apps/ios")
                .with_option("bundleId", "com.saucelabs.SwagLabsMobileApp")
                .with_option("shouldUseSingleton", false)
                .with_option("shouldUseTestManagerForVisibilityDetection", false),
        ];

        let auto_detect = vec![
            CapabilityProfile::new(AUTO_DETECT, Platform::Android)
                .with_automation("UiAutomator2")
                .with_app(android_app)
                .with_option("appPackage", "com.swaglabsmobileapp")
                .with_option("appActivity", "com.swaglabsmobileapp.MainActivity"),
            CapabilityProfile::new(AUTO_DETECT, Platform::IOS)
                .with_automation("XCUITest")
                .with_app("apps/ios")
                .with_option("bundleId", "com.saucelabs.SwagLabsMobileApp"),
        ];

        Self::assemble(common, profiles, auto_detect)
    }

    /// Process-wide store, initialized on first access
    ///
    /// Reads the file named by `DEVICE_OXIDE_PROFILES` when set, otherwise the
    /// built-in catalogue rebased onto `DEVICE_OXIDE_APP_ROOT` when that is set.
    pub fn global() -> Result<Arc<ProfileStore>> {
        if let Some(store) = GLOBAL_STORE.get() {
            return Ok(store.clone());
        }

        let store = match std::env::var(PROFILES_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => {
                debug!("Using built-in profile catalogue");
                Self::builtin()
            }
        };
        let store = match std::env::var(APP_ROOT_ENV) {
            Ok(root) => store.with_app_root(root),
            Err(_) => store,
        };

        Ok(GLOBAL_STORE.get_or_init(|| Arc::new(store)).clone())
    }

    /// Seed the process-wide store; fails once it has been initialized
    pub fn install_global(store: ProfileStore) -> Result<Arc<ProfileStore>> {
        let store = Arc::new(store);
        GLOBAL_STORE
            .set(store.clone())
            .map_err(|_| Error::configuration("Profile store already initialized"))?;
        Ok(store)
    }

    /// Look up a profile by id
    pub fn get_profile(&self, id: &str) -> Result<&CapabilityProfile> {
        self.index
            .get(id)
            .map(|&pos| &self.profiles[pos])
            .ok_or_else(|| Error::profile_not_found(id))
    }

    /// All profiles in insertion order
    pub fn list_profiles(&self) -> &[CapabilityProfile] {
        &self.profiles
    }

    /// Profiles targeting one platform, in insertion order
    pub fn profiles_for(&self, platform: Platform) -> Vec<&CapabilityProfile> {
        self.profiles
            .iter()
            .filter(|p| p.platform == platform)
            .collect()
    }

    /// Template used when a device is auto-detected
    pub fn auto_detect_template(&self, platform: Platform) -> Option<&CapabilityProfile> {
        self.auto_detect.get(&platform)
    }

    /// Capabilities shared by every profile
    pub fn common(&self) -> &Capabilities {
        &self.common
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

//! Capability profile types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result};

/// Mobile platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(alias = "android", alias = "ANDROID")]
    Android,
    #[serde(rename = "iOS", alias = "ios", alias = "IOS")]
    IOS,
}

impl Platform {
    /// Default automation engine for the platform
    pub fn default_automation(&self) -> &'static str {
        match self {
            Platform::Android => "UiAutomator2",
            Platform::IOS => "XCUITest",
        }
    }

    /// Capability naming the app under test
    pub fn app_id_capability(&self) -> &'static str {
        match self {
            Platform::Android => "appPackage",
            Platform::IOS => "bundleId",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => f.write_str("Android"),
            Platform::IOS => f.write_str("iOS"),
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::IOS),
            other => Err(Error::configuration(format!("Unknown platform: {}", other))),
        }
    }
}

/// A single capability value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl CapabilityValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CapabilityValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CapabilityValue {
    fn from(value: &str) -> Self {
        CapabilityValue::Str(value.to_string())
    }
}

impl From<String> for CapabilityValue {
    fn from(value: String) -> Self {
        CapabilityValue::Str(value)
    }
}

impl From<bool> for CapabilityValue {
    fn from(value: bool) -> Self {
        CapabilityValue::Bool(value)
    }
}

impl From<i64> for CapabilityValue {
    fn from(value: i64) -> Self {
        CapabilityValue::Int(value)
    }
}

/// W3C capability names that must not carry a vendor prefix
const W3C_STANDARD_CAPS: &[&str] = &[
    "platformName",
    "browserName",
    "browserVersion",
    "acceptInsecureCerts",
    "pageLoadStrategy",
    "proxy",
    "setWindowRect",
    "timeouts",
    "strictFileInteractability",
    "unhandledPromptBehavior",
];

/// Capability set negotiated with the automation engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeMap<String, CapabilityValue>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a capability, replacing any previous value
    pub fn set<K: Into<String>, V: Into<CapabilityValue>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&CapabilityValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(CapabilityValue::as_str)
    }

    /// Merge `other` on top of this set
    pub fn extend(&mut self, other: &Capabilities) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CapabilityValue)> {
        self.0.iter()
    }

    /// Identifier of the app under test (`appPackage` or `bundleId`)
    pub fn app_id(&self, platform: Platform) -> Option<&str> {
        self.get_str(platform.app_id_capability())
    }

    /// Render as a W3C `alwaysMatch` object with `appium:` vendor prefixes
    pub fn to_w3c(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(key, value)| {
                let name = if key.contains(':') || W3C_STANDARD_CAPS.contains(&key.as_str()) {
                    key.clone()
                } else {
                    format!("appium:{}", key)
                };
                let value = match value {
                    CapabilityValue::Bool(b) => serde_json::Value::Bool(*b),
                    CapabilityValue::Int(i) => serde_json::Value::from(*i),
                    CapabilityValue::Str(s) => serde_json::Value::String(s.clone()),
                };
                (name, value)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<CapabilityValue>> FromIterator<(K, V)> for Capabilities {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut caps = Capabilities::new();
        for (key, value) in iter {
            caps.set(key, value);
        }
        caps
    }
}

/// Named, static device configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CapabilityProfile {
    /// Profile identifier
    #[serde(default)]
    pub id: String,
    /// Target platform
    pub platform: Platform,
    /// OS version constraint (`auto` or absent matches any)
    #[serde(default)]
    pub platform_version: Option<String>,
    /// Device or AVD name
    #[serde(default)]
    pub device_name: Option<String>,
    /// Automation engine
    #[serde(default)]
    pub automation_name: Option<String>,
    /// App binary or directory holding an `.app` bundle
    #[serde(default)]
    pub app: Option<PathBuf>,
    /// Driver-specific options
    #[serde(default)]
    pub options: Capabilities,
}

impl CapabilityProfile {
    pub fn new<S: Into<String>>(id: S, platform: Platform) -> Self {
        Self {
            id: id.into(),
            platform,
            platform_version: None,
            device_name: None,
            automation_name: None,
            app: None,
            options: Capabilities::new(),
        }
    }

    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.platform_version = Some(version.into());
        self
    }

    pub fn with_device_name<S: Into<String>>(mut self, name: S) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn with_automation<S: Into<String>>(mut self, name: S) -> Self {
        self.automation_name = Some(name.into());
        self
    }

    pub fn with_app<P: Into<PathBuf>>(mut self, app: P) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn with_option<K: Into<String>, V: Into<CapabilityValue>>(mut self, key: K, value: V) -> Self {
        self.options.set(key, value);
        self
    }

    /// Version constraint, `None` when any version is acceptable
    pub fn version_constraint(&self) -> Option<&str> {
        match self.platform_version.as_deref() {
            None | Some("") | Some("auto") => None,
            Some(v) => Some(v),
        }
    }

    /// Build the full capability set, layering `common` underneath this profile
    pub fn capabilities(&self, common: &Capabilities, verify_app: bool) -> Result<Capabilities> {
        let mut caps = common.clone();
        caps.set("platformName", self.platform.to_string());
        if let Some(version) = self.version_constraint() {
            caps.set("platformVersion", version);
        }
        if let Some(name) = &self.device_name {
            caps.set("deviceName", name.as_str());
        }
        caps.set(
            "automationName",
            self.automation_name
                .as_deref()
                .unwrap_or_else(|| self.platform.default_automation()),
        );
        if let Some(app) = &self.app {
            let app = if verify_app {
                locate_app(app)?
            } else {
                app.clone()
            };
            caps.set("app", app.to_string_lossy().into_owned());
        }
        caps.extend(&self.options);
        Ok(caps)
    }
}

/// Resolve an app path, searching directories for the first `.app` bundle
pub fn locate_app(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::AppNotFound(path.to_path_buf()));
    }

    let is_bundle = path.extension().map(|ext| ext == "app").unwrap_or(false);
    if !path.is_dir() || is_bundle {
        return Ok(path.to_path_buf());
    }

    let mut bundles: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|ext| ext == "app").unwrap_or(false))
        .collect();
    bundles.sort();

    bundles
        .into_iter()
        .next()
        .ok_or_else(|| Error::AppNotFound(path.to_path_buf()))
}

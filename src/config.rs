//! Configuration management for Device-Oxide

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Runtime configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Appium server URL
    pub server_url: String,

    /// TOML file with capability profiles (built-in catalogue when unset)
    pub profiles_path: Option<String>,

    /// Directory that relative app paths in the built-in catalogue resolve
    /// against (working directory when unset)
    pub app_root: Option<String>,

    /// Device request: a profile id or `auto_detect`
    pub device: String,

    /// Maximum session start attempts
    pub max_attempts: u32,

    /// Backoff strategy: `fixed` or `exponential`
    pub backoff: String,

    /// First backoff delay in milliseconds
    pub backoff_initial_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds
    pub backoff_max_ms: u64,

    /// Growth factor for exponential backoff
    pub backoff_multiplier: f64,

    /// Add random jitter to backoff delays
    pub backoff_jitter: bool,

    /// Session open timeout per attempt in milliseconds
    pub open_timeout_ms: u64,

    /// Session close timeout in milliseconds
    pub close_timeout_ms: u64,

    /// Health check timeout in milliseconds
    pub health_timeout_ms: u64,

    /// Device inventory query timeout in milliseconds
    pub inventory_timeout_ms: u64,

    /// Refuse profiles whose app binary is missing
    pub verify_app: bool,

    /// adb executable
    pub adb_path: String,

    /// xcrun executable
    pub xcrun_path: String,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:4723".to_string(),
            profiles_path: None,
            app_root: None,
            device: "auto_detect".to_string(),
            max_attempts: 3,
            backoff: "exponential".to_string(),
            backoff_initial_ms: 1000,
            backoff_max_ms: 10000,
            backoff_multiplier: 2.0,
            backoff_jitter: false,
            open_timeout_ms: 120000,
            close_timeout_ms: 30000,
            health_timeout_ms: 5000,
            inventory_timeout_ms: 10000,
            verify_app: true,
            adb_path: "adb".to_string(),
            xcrun_path: "xcrun".to_string(),
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: String) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid {}", name)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Overlay `DEVICE_OXIDE_*` environment variables on this configuration
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(url) = env::var("DEVICE_OXIDE_SERVER_URL") {
            self.server_url = url;
        }

        if let Ok(path) = env::var("DEVICE_OXIDE_PROFILES") {
            self.profiles_path = Some(path);
        }

        if let Ok(root) = env::var("DEVICE_OXIDE_APP_ROOT") {
            self.app_root = Some(root);
        }

        if let Ok(device) = env::var("DEVICE_OXIDE_DEVICE") {
            self.device = device;
        }

        if let Ok(attempts) = env::var("DEVICE_OXIDE_MAX_ATTEMPTS") {
            self.max_attempts = parse_var("DEVICE_OXIDE_MAX_ATTEMPTS", attempts)?;
        }

        if let Ok(backoff) = env::var("DEVICE_OXIDE_BACKOFF") {
            self.backoff = backoff;
        }

        if let Ok(initial) = env::var("DEVICE_OXIDE_BACKOFF_INITIAL_MS") {
            self.backoff_initial_ms = parse_var("DEVICE_OXIDE_BACKOFF_INITIAL_MS", initial)?;
        }

        if let Ok(max) = env::var("DEVICE_OXIDE_BACKOFF_MAX_MS") {
            self.backoff_max_ms = parse_var("DEVICE_OXIDE_BACKOFF_MAX_MS", max)?;
        }

        if let Ok(jitter) = env::var("DEVICE_OXIDE_BACKOFF_JITTER") {
            self.backoff_jitter = parse_var("DEVICE_OXIDE_BACKOFF_JITTER", jitter)?;
        }

        if let Ok(timeout) = env::var("DEVICE_OXIDE_OPEN_TIMEOUT_MS") {
            self.open_timeout_ms = parse_var("DEVICE_OXIDE_OPEN_TIMEOUT_MS", timeout)?;
        }

        if let Ok(timeout) = env::var("DEVICE_OXIDE_CLOSE_TIMEOUT_MS") {
            self.close_timeout_ms = parse_var("DEVICE_OXIDE_CLOSE_TIMEOUT_MS", timeout)?;
        }

        if let Ok(timeout) = env::var("DEVICE_OXIDE_HEALTH_TIMEOUT_MS") {
            self.health_timeout_ms = parse_var("DEVICE_OXIDE_HEALTH_TIMEOUT_MS", timeout)?;
        }

        if let Ok(timeout) = env::var("DEVICE_OXIDE_INVENTORY_TIMEOUT_MS") {
            self.inventory_timeout_ms = parse_var("DEVICE_OXIDE_INVENTORY_TIMEOUT_MS", timeout)?;
        }

        if let Ok(verify) = env::var("DEVICE_OXIDE_VERIFY_APP") {
            self.verify_app = parse_var("DEVICE_OXIDE_VERIFY_APP", verify)?;
        }

        if let Ok(adb) = env::var("DEVICE_OXIDE_ADB") {
            self.adb_path = adb;
        }

        if let Ok(xcrun) = env::var("DEVICE_OXIDE_XCRUN") {
            self.xcrun_path = xcrun;
        }

        if let Ok(log_level) = env::var("DEVICE_OXIDE_LOG_LEVEL") {
            self.log_level = log_level;
        }

        self.validate()?;
        Ok(self)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::configuration("max_attempts must be at least 1"));
        }
        if !matches!(self.backoff.as_str(), "fixed" | "exponential") {
            return Err(Error::configuration(format!(
                "Unknown backoff strategy: {}",
                self.backoff
            )));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(Error::configuration("backoff_multiplier must be >= 1.0"));
        }
        Ok(())
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn inventory_timeout(&self) -> Duration {
        Duration::from_millis(self.inventory_timeout_ms)
    }
}

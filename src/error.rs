//! Unified error types for Device-Oxide

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Cause of a failed session start
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartFailure {
    /// The start call did not complete in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The automation server is not accepting sessions yet
    #[error("driver not ready: {0}")]
    DriverNotReady(String),

    /// The device is attached but has not finished booting
    #[error("device still booting: {0}")]
    DeviceBooting(String),

    /// Unexpected transport-level failure talking to the server
    #[error("transport failure: {0}")]
    Transport(String),

    /// The automation engine refused the requested capabilities
    #[error("capabilities rejected: {0}")]
    CapabilitiesRejected(String),

    /// The device went away during negotiation
    #[error("device lost: {0}")]
    DeviceLost(String),
}

impl StartFailure {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StartFailure::Timeout(_)
                | StartFailure::DriverNotReady(_)
                | StartFailure::DeviceBooting(_)
                | StartFailure::Transport(_)
        )
    }
}

/// Unified error type for Device-Oxide
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Profile id absent from the store
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// No attached device satisfies the profile
    #[error(
        "No attached device matches profile '{profile}' ({platform} {version}); start a matching emulator or simulator"
    )]
    NoMatchingDevice {
        profile: String,
        platform: String,
        version: String,
    },

    /// Auto-detect found nothing usable
    #[error("No device available: {0}; start an emulator or simulator and retry")]
    NoDeviceAvailable(String),

    /// Session could not be started
    #[error("Session start failed after {attempts} attempt(s): {cause}")]
    SessionStart { attempts: u32, cause: StartFailure },

    /// Another live session holds the device
    #[error("Device busy: {0} already has a live session")]
    DeviceBusy(String),

    /// Configured app binary is missing
    #[error("App not found: {}", .0.display())]
    AppNotFound(PathBuf),

    /// Driver call failed outside of session start
    #[error("Driver error: {0}")]
    Driver(String),

    /// Device inventory query failed
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// Every app reset strategy failed
    #[error("App reset failed: {0}")]
    ResetFailed(String),

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Work abandoned on an external signal
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new profile not found error
    pub fn profile_not_found<S: Into<String>>(id: S) -> Self {
        Error::ProfileNotFound(id.into())
    }

    /// Create a new no device available error
    pub fn no_device_available<S: Into<String>>(msg: S) -> Self {
        Error::NoDeviceAvailable(msg.into())
    }

    /// Create a session start error for a single attempt
    pub fn session_start(cause: StartFailure) -> Self {
        Error::SessionStart { attempts: 1, cause }
    }

    /// Create a new device busy error
    pub fn device_busy<S: Into<String>>(device_id: S) -> Self {
        Error::DeviceBusy(device_id.into())
    }

    /// Create a new driver error
    pub fn driver<S: Into<String>>(msg: S) -> Self {
        Error::Driver(msg.into())
    }

    /// Create a new inventory error
    pub fn inventory<S: Into<String>>(msg: S) -> Self {
        Error::Inventory(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        Error::Cancelled(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether the retry policy may try the failed operation again
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::SessionStart { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }

    /// The start failure cause, if this is a session start error
    pub fn start_failure(&self) -> Option<&StartFailure> {
        match self {
            Error::SessionStart { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

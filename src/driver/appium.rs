//! Appium (W3C WebDriver) HTTP driver

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::traits::AutomationDriver;
use crate::error::StartFailure;
use crate::profile::Capabilities;
use crate::Error;

/// Appium server client
#[derive(Debug, Clone)]
pub struct AppiumDriver {
    /// Server URL without trailing slash (e.g. "http://localhost:4723")
    base_url: String,
    client: reqwest::Client,
    /// Per-request timeout for session creation
    create_timeout: Duration,
}

/// Error payload of a W3C response
#[derive(Debug, Default, PartialEq)]
pub struct W3cError {
    pub error: String,
    pub message: String,
}

impl W3cError {
    /// Extract `value.error` / `value.message` from a response body
    pub fn from_body(body: &Value) -> Self {
        let value = body.get("value").unwrap_or(body);
        Self {
            error: value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Classify a failed `POST /session` response
pub fn classify_start_failure(status: u16, err: &W3cError) -> StartFailure {
    let message = if err.message.is_empty() {
        format!("HTTP {} {}", status, err.error).trim_end().to_string()
    } else {
        err.message.clone()
    };
    let lower = message.to_lowercase();

    if err.error == "invalid argument" {
        return StartFailure::CapabilitiesRejected(message);
    }

    const BOOTING: &[&str] = &[
        "still booting",
        "not finished booting",
        "sys.boot_completed",
        "device is not ready",
        "not ready",
        "timed out waiting",
    ];
    if BOOTING.iter().any(|needle| lower.contains(needle)) {
        return StartFailure::DeviceBooting(message);
    }

    const LOST: &[&str] = &[
        "could not find a connected",
        "device not found",
        "is not connected",
        "device offline",
        "device is offline",
        "unknown device",
    ];
    if LOST.iter().any(|needle| lower.contains(needle)) {
        return StartFailure::DeviceLost(message);
    }

    if err.error == "session not created" {
        return StartFailure::CapabilitiesRejected(message);
    }

    StartFailure::Transport(message)
}

impl AppiumDriver {
    /// Create a new driver for the server at `base_url`
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self, Error> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Creating Appium driver for {}", base_url);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            create_timeout: Duration::from_secs(300),
        })
    }

    /// Set the HTTP timeout for session creation
    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_transport(&self, e: reqwest::Error) -> StartFailure {
        if e.is_connect() {
            StartFailure::DriverNotReady(format!("{} unreachable: {}", self.base_url, e))
        } else if e.is_timeout() {
            StartFailure::Timeout(self.create_timeout)
        } else {
            StartFailure::Transport(e.to_string())
        }
    }

    async fn read_body(response: reqwest::Response) -> Value {
        response.json::<Value>().await.unwrap_or(Value::Null)
    }

    /// POST an `appium/device` command that takes an `appId`
    async fn app_command(&self, session_id: &str, command: &str, app_id: &str) -> Result<(), Error> {
        let url = self.url(&format!("/session/{}/appium/device/{}", session_id, command));
        debug!("POST {} appId={}", url, app_id);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "appId": app_id }))
            .send()
            .await
            .map_err(|e| Error::driver(format!("{} failed: {}", command, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let err = W3cError::from_body(&Self::read_body(response).await);
        Err(Error::driver(format!(
            "{} returned {}: {} {}",
            command, status, err.error, err.message
        )))
    }
}

#[async_trait]
impl AutomationDriver for AppiumDriver {
    async fn create_session(&self, capabilities: &Capabilities) -> Result<String, Error> {
        let body = json!({
            "capabilities": {
                "alwaysMatch": capabilities.to_w3c(),
                "firstMatch": [{}],
            }
        });
        let url = self.url("/session");
        debug!("POST {} with {} capabilities", url, capabilities.len());

        let response = self
            .client
            .post(&url)
            .timeout(self.create_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::session_start(self.map_transport(e)))?;

        let status = response.status();
        let body = Self::read_body(response).await;

        if !status.is_success() {
            let err = W3cError::from_body(&body);
            let cause = classify_start_failure(status.as_u16(), &err);
            warn!("Session creation rejected ({}): {}", status, cause);
            return Err(Error::session_start(cause));
        }

        body.pointer("/value/sessionId")
            .or_else(|| body.get("sessionId"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::session_start(StartFailure::Transport(
                    "response carries no sessionId".to_string(),
                ))
            })
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), Error> {
        let url = self.url(&format!("/session/{}", session_id));
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| Error::driver(format!("Failed to delete session {}: {}", session_id, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let err = W3cError::from_body(&Self::read_body(response).await);
        if status == reqwest::StatusCode::NOT_FOUND || err.error == "invalid session id" {
            debug!("Session {} already gone on the server", session_id);
            return Ok(());
        }

        Err(Error::driver(format!(
            "Delete of session {} returned {}: {}",
            session_id, status, err.message
        )))
    }

    async fn session_alive(&self, session_id: &str) -> Result<bool, Error> {
        let url = self.url(&format!("/session/{}/timeouts", session_id));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::driver(format!("Liveness check failed: {}", e)))?;

        Ok(response.status().is_success())
    }

    async fn server_ready(&self) -> Result<bool, Error> {
        let response = self
            .client
            .get(self.url("/status"))
            .send()
            .await
            .map_err(|e| Error::driver(format!("Status request failed: {}", e)))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let body = Self::read_body(response).await;
        Ok(body
            .pointer("/value/ready")
            .and_then(Value::as_bool)
            .unwrap_or(true))
    }

    async fn terminate_app(&self, session_id: &str, app_id: &str) -> Result<(), Error> {
        self.app_command(session_id, "terminate_app", app_id).await
    }

    async fn activate_app(&self, session_id: &str, app_id: &str) -> Result<(), Error> {
        self.app_command(session_id, "activate_app", app_id).await
    }
}

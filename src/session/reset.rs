//! App reset chain
//!
//! Brings the app under test back to a clean state between tests by trying
//! reset strategies in order until one succeeds.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::profile::Platform;
use crate::session::handle::Session;
use crate::{Error, Result};

/// One way of resetting the app under test
#[async_trait]
pub trait ResetStrategy: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    async fn apply(&self, session: &Session) -> Result<()>;
}

fn require_app_id(session: &Session) -> Result<String> {
    session
        .app_id()
        .map(str::to_string)
        .ok_or_else(|| {
            Error::configuration(format!(
                "No app id capability for {} session {}",
                session.platform(),
                session.id()
            ))
        })
}

/// `adb shell pm clear` followed by an app launch (Android only)
#[derive(Debug, Clone)]
pub struct ClearAppData {
    adb_path: String,
    timeout: Duration,
    settle: Duration,
}

impl ClearAppData {
    pub fn new(adb_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            adb_path: adb_path.into(),
            timeout,
            settle: Duration::from_secs(1),
        }
    }

    /// Pause between clearing and relaunching
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

#[async_trait]
impl ResetStrategy for ClearAppData {
    fn name(&self) -> &str {
        "clear_app_data"
    }

    async fn apply(&self, session: &Session) -> Result<()> {
        if session.platform() != Platform::Android {
            return Err(Error::driver("clearing app data is only supported on Android"));
        }
        let app_id = require_app_id(session)?;
        let serial = &session.device().device_id;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.adb_path)
                .args(["-s", serial.as_str(), "shell", "pm", "clear", app_id.as_str()])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::timeout(format!("pm clear {} after {:?}", app_id, self.timeout)))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || !stdout.contains("Success") {
            return Err(Error::driver(format!(
                "pm clear {} failed: {}{}",
                app_id,
                stdout.trim(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tokio::time::sleep(self.settle).await;
        session.activate_app(&app_id).await
    }
}

/// Terminate then relaunch the app through the driver
#[derive(Debug, Clone)]
pub struct RestartApp {
    pause: Duration,
}

impl RestartApp {
    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }
}

impl Default for RestartApp {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl ResetStrategy for RestartApp {
    fn name(&self) -> &str {
        "restart_app"
    }

    async fn apply(&self, session: &Session) -> Result<()> {
        let app_id = require_app_id(session)?;
        session.terminate_app(&app_id).await?;
        tokio::time::sleep(self.pause).await;
        session.activate_app(&app_id).await
    }
}

/// Ordered fallback of reset strategies
#[derive(Debug, Clone, Default)]
pub struct ResetChain {
    strategies: Vec<Arc<dyn ResetStrategy>>,
}

impl ResetChain {
    pub fn new(strategies: Vec<Arc<dyn ResetStrategy>>) -> Self {
        Self { strategies }
    }

    /// `ClearAppData` then `RestartApp`
    pub fn standard(config: &Config) -> Self {
        Self::new(vec![
            Arc::new(ClearAppData::new(
                config.adb_path.clone(),
                config.inventory_timeout(),
            )),
            Arc::new(RestartApp::default()),
        ])
    }

    pub fn push(&mut self, strategy: Arc<dyn ResetStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Apply strategies in order and return the name of the first that worked
    pub async fn run(&self, session: &Session) -> Result<String> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let started = Instant::now();
            debug!("Trying reset strategy {} on {}", strategy.name(), session.id());
            match strategy.apply(session).await {
                Ok(()) => {
                    info!(
                        "App reset via {} in {:?}",
                        strategy.name(),
                        started.elapsed()
                    );
                    return Ok(strategy.name().to_string());
                }
                Err(e) => {
                    warn!(
                        "Reset strategy {} failed after {:?}: {}",
                        strategy.name(),
                        started.elapsed(),
                        e
                    );
                    failures.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(Error::ResetFailed("no reset strategies configured".into()));
        }
        Err(Error::ResetFailed(failures.join("; ")))
    }
}

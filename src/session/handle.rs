//! Session handle
//!
//! An opened automation session bound to one resolved device.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::device::ResolvedDevice;
use crate::driver::AutomationDriver;
use crate::profile::{Capabilities, Platform};
use crate::retry::AttemptRecord;
use crate::session::lease::DeviceLease;
use crate::session::state::SessionState;
use crate::{Error, Result};

/// Live automation session
///
/// Owned by the caller that opened it. `close()` is idempotent; dropping an
/// open session releases the device and schedules a best-effort delete.
#[derive(Debug)]
pub struct Session {
    id: String,
    device: ResolvedDevice,
    driver: Arc<dyn AutomationDriver>,
    state: Mutex<SessionState>,
    lease: Mutex<Option<DeviceLease>>,
    opened_at: DateTime<Utc>,
    close_timeout: Duration,
    attempts: Vec<AttemptRecord>,
}

impl Session {
    pub(crate) fn new(
        id: String,
        device: ResolvedDevice,
        driver: Arc<dyn AutomationDriver>,
        lease: DeviceLease,
        close_timeout: Duration,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            id,
            device,
            driver,
            state: Mutex::new(SessionState::Open),
            lease: Mutex::new(Some(lease)),
            opened_at: Utc::now(),
            close_timeout,
            attempts,
        }
    }

    /// Server-side session id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device(&self) -> &ResolvedDevice {
        &self.device
    }

    pub fn platform(&self) -> Platform {
        self.device.platform
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.device.capabilities
    }

    /// App under test (`appPackage` / `bundleId`)
    pub fn app_id(&self) -> Option<&str> {
        self.device.capabilities.app_id(self.device.platform)
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Start attempts it took to open this session
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn state(&self) -> SessionState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state() {
            SessionState::Open => Ok(()),
            other => Err(Error::driver(format!("Session {} is {}", self.id, other))),
        }
    }

    /// Swap the state if the current one allows it; returns whether it moved
    fn advance(&self, next: SessionState) -> bool {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        match state.transition(next) {
            Ok(new_state) => {
                *state = new_state;
                true
            }
            Err(_) => false,
        }
    }

    fn release_lease(&self) {
        let lease = match self.lease.lock() {
            Ok(mut lease) => lease.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(lease);
    }

    /// Liveness check; never changes the session state
    pub async fn health_check(&self, timeout: Duration) -> bool {
        if !self.is_open() {
            return false;
        }
        match tokio::time::timeout(timeout, self.driver.session_alive(&self.id)).await {
            Ok(Ok(alive)) => alive,
            Ok(Err(e)) => {
                debug!("Health check of {} failed: {}", self.id, e);
                false
            }
            Err(_) => {
                debug!("Health check of {} timed out after {:?}", self.id, timeout);
                false
            }
        }
    }

    /// End the session
    ///
    /// Only the first call talks to the server; later calls, and calls on a
    /// failed session, return `Ok(())`. A delete error leaves the session
    /// `Failed` and is returned so the caller can log it. The device lease is
    /// released either way.
    pub async fn close(&self) -> Result<()> {
        if !self.advance(SessionState::Closing) {
            debug!("Session {} already {}", self.id, self.state());
            return Ok(());
        }

        let result = match tokio::time::timeout(
            self.close_timeout,
            self.driver.delete_session(&self.id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "closing session {} after {:?}",
                self.id, self.close_timeout
            ))),
        };

        match &result {
            Ok(()) => {
                self.advance(SessionState::Closed);
                info!("Session {} on {} closed", self.id, self.device.device_id);
            }
            Err(e) => {
                self.advance(SessionState::Failed);
                warn!("Session {} teardown failed: {}", self.id, e);
            }
        }

        self.release_lease();
        result
    }

    /// Mark an open session as unusable and release its device
    pub fn fail(&self, reason: &str) {
        if self.advance(SessionState::Failed) {
            warn!("Session {} failed: {}", self.id, reason);
            self.release_lease();
        }
    }

    pub async fn terminate_app(&self, app_id: &str) -> Result<()> {
        self.ensure_open()?;
        self.driver.terminate_app(&self.id, app_id).await
    }

    pub async fn activate_app(&self, app_id: &str) -> Result<()> {
        self.ensure_open()?;
        self.driver.activate_app(&self.id, app_id).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state().is_terminal() {
            return;
        }

        warn!(
            "Session {} on {} dropped while {}; releasing device",
            self.id,
            self.device.device_id,
            self.state()
        );

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let driver = self.driver.clone();
            let id = self.id.clone();
            let timeout = self.close_timeout;
            handle.spawn(async move {
                match tokio::time::timeout(timeout, driver.delete_session(&id)).await {
                    Ok(Ok(())) => debug!("Deferred delete of session {} done", id),
                    Ok(Err(e)) => warn!("Deferred delete of session {} failed: {}", id, e),
                    Err(_) => warn!("Deferred delete of session {} timed out after {:?}", id, timeout),
                }
            });
        }
        // the lease field drops with the session
    }
}

//! Session manager implementation
//!
//! Opens sessions through the retry policy, enforces one live session per
//! device and guarantees teardown for scoped sessions.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::device::ResolvedDevice;
use crate::driver::AutomationDriver;
use crate::error::StartFailure;
use crate::profile::Capabilities;
use crate::retry::RetryPolicy;
use crate::session::handle::Session;
use crate::session::lease::DeviceLeases;
use crate::session::state::SessionState;
use crate::{Error, Result};

/// Session manager
#[derive(Debug, Clone)]
pub struct SessionManager {
    driver: Arc<dyn AutomationDriver>,
    leases: Arc<DeviceLeases>,
    policy: RetryPolicy,
    open_timeout: Duration,
    close_timeout: Duration,
    health_timeout: Duration,
}

impl SessionManager {
    /// Create a manager on the process-wide lease registry with default policy
    pub fn new(driver: Arc<dyn AutomationDriver>) -> Self {
        Self {
            driver,
            leases: DeviceLeases::shared(),
            policy: RetryPolicy::default(),
            open_timeout: Duration::from_secs(120),
            close_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(driver: Arc<dyn AutomationDriver>, config: &Config) -> Self {
        Self::new(driver)
            .with_policy(RetryPolicy::from_config(config))
            .with_timeouts(
                config.open_timeout(),
                config.close_timeout(),
                config.health_timeout(),
            )
    }

    /// Use a separate lease registry
    pub fn with_leases(mut self, leases: Arc<DeviceLeases>) -> Self {
        self.leases = leases;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the open (per attempt), close and health-check timeouts
    pub fn with_timeouts(mut self, open: Duration, close: Duration, health: Duration) -> Self {
        self.open_timeout = open;
        self.close_timeout = close;
        self.health_timeout = health;
        self
    }

    pub fn leases(&self) -> &Arc<DeviceLeases> {
        &self.leases
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Devices with a live session in this manager's lease registry
    pub fn live_sessions(&self) -> usize {
        self.leases.busy_count()
    }

    /// Open a session on the device
    ///
    /// Fails immediately with `DeviceBusy` if the device already has a live
    /// session. Otherwise start attempts run through the retry policy; on
    /// failure the device is released and the last cause is returned.
    pub async fn open(&self, device: &ResolvedDevice) -> Result<Session> {
        let lease = self.leases.acquire(&device.device_id)?;
        let mut state = SessionState::Idle.transition(SessionState::Opening)?;
        info!(
            "Opening session on {} (profile {}, {} {})",
            device.device_id, device.profile_id, device.platform, device.version
        );

        let result = self
            .policy
            .run(|attempt| self.start_once(&device.capabilities, attempt))
            .await;

        match result {
            Ok(attempted) => {
                state = state.transition(SessionState::Open)?;
                info!(
                    "Session {} {} on {} after {} attempt(s)",
                    attempted.value,
                    state,
                    device.device_id,
                    attempted.attempt_count()
                );
                Ok(Session::new(
                    attempted.value,
                    device.clone(),
                    self.driver.clone(),
                    lease,
                    self.close_timeout,
                    attempted.attempts,
                ))
            }
            Err(e) => {
                state = state.transition(SessionState::Failed)?;
                warn!("Session on {} {}: {}", device.device_id, state, e);
                drop(lease);
                Err(e)
            }
        }
    }

    /// One start attempt: create under the open timeout, then check liveness
    async fn start_once(&self, capabilities: &Capabilities, attempt: u32) -> Result<String> {
        debug!("Start attempt {}", attempt);

        let session_id = match tokio::time::timeout(
            self.open_timeout,
            self.driver.create_session(capabilities),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::session_start(StartFailure::Timeout(self.open_timeout)));
            }
        };

        let alive = tokio::time::timeout(self.health_timeout, self.driver.session_alive(&session_id))
            .await;
        let reason = match alive {
            Ok(Ok(true)) => return Ok(session_id),
            Ok(Ok(false)) => "session vanished right after creation".to_string(),
            Ok(Err(e)) => format!("liveness check failed: {}", e),
            Err(_) => format!("liveness check timed out after {:?}", self.health_timeout),
        };

        match tokio::time::timeout(self.close_timeout, self.driver.delete_session(&session_id))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Cleanup of unhealthy session {} failed: {}", session_id, e),
            Err(_) => warn!(
                "Cleanup of unhealthy session {} timed out after {:?}",
                session_id, self.close_timeout
            ),
        }
        Err(Error::session_start(StartFailure::DriverNotReady(reason)))
    }

    /// Close a session; a no-op for sessions that are already closed or failed
    pub async fn close(&self, session: &Session) -> Result<()> {
        session.close().await
    }

    /// Liveness check bounded by the manager's health timeout
    pub async fn health_check(&self, session: &Session) -> bool {
        session.health_check(self.health_timeout).await
    }

    /// Run `body` against a fresh session and always close it afterwards
    ///
    /// The session is closed exactly once whether the body returns, fails, or
    /// panics; a panic is resumed after teardown. Teardown errors are logged
    /// and never replace the body's result.
    ///
    /// ```no_run
    /// # use device_oxide::session::SessionManager;
    /// # use device_oxide::device::ResolvedDevice;
    /// # use futures::FutureExt;
    /// # async fn demo(manager: SessionManager, device: ResolvedDevice) -> device_oxide::Result<()> {
    /// let healthy = manager
    ///     .with_session(&device, |session| async move { Ok(session.is_open()) }.boxed())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_session<T, F>(&self, device: &ResolvedDevice, body: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s Session) -> BoxFuture<'s, Result<T>>,
    {
        self.with_session_until(device, futures::future::pending::<()>(), body)
            .await
    }

    /// Like `with_session`, but gives up as soon as `cancel` completes
    ///
    /// Cancellation while opening releases the device and returns
    /// `Error::Cancelled`. Cancellation while the body runs drops the body,
    /// closes the session, then returns `Error::Cancelled`.
    pub async fn with_session_until<T, F, C>(
        &self,
        device: &ResolvedDevice,
        cancel: C,
        body: F,
    ) -> Result<T>
    where
        F: for<'s> FnOnce(&'s Session) -> BoxFuture<'s, Result<T>>,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let session = tokio::select! {
            opened = self.open(device) => opened?,
            _ = &mut cancel => {
                warn!("Cancelled while opening a session on {}", device.device_id);
                return Err(Error::cancelled(format!("opening session on {}", device.device_id)));
            }
        };

        let outcome = tokio::select! {
            outcome = AssertUnwindSafe(body(&session)).catch_unwind() => Some(outcome),
            _ = &mut cancel => {
                warn!("Session {} cancelled; closing", session.id());
                None
            }
        };

        if let Err(e) = session.close().await {
            warn!("Teardown of session {} failed: {}", session.id(), e);
        }

        match outcome {
            Some(Ok(result)) => result,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => Err(Error::cancelled(format!(
                "session {} on {}",
                session.id(),
                device.device_id
            ))),
        }
    }
}

//! Mock automation driver for testing
//!
//! Scripts start failures, latency and teardown errors so the session manager
//! and retry policy can be exercised without an Appium server.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::driver::traits::AutomationDriver;
use crate::error::StartFailure;
use crate::profile::Capabilities;
use crate::Error;

/// Mock automation driver
#[derive(Debug)]
pub struct MockDriver {
    start_failures: Mutex<VecDeque<StartFailure>>,
    create_delay: Mutex<Option<Duration>>,
    fail_delete: AtomicBool,
    hang_delete: AtomicBool,
    fail_app_commands: AtomicBool,
    alive: AtomicBool,
    ready: AtomicBool,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    live: Mutex<HashSet<String>>,
    app_commands: Mutex<Vec<String>>,
    last_capabilities: Mutex<Option<Capabilities>>,
}

impl MockDriver {
    /// Create a new mock driver that accepts every session
    pub fn new() -> Self {
        Self {
            start_failures: Mutex::new(VecDeque::new()),
            create_delay: Mutex::new(None),
            fail_delete: AtomicBool::new(false),
            hang_delete: AtomicBool::new(false),
            fail_app_commands: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            ready: AtomicBool::new(true),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            live: Mutex::new(HashSet::new()),
            app_commands: Mutex::new(Vec::new()),
            last_capabilities: Mutex::new(None),
        }
    }

    /// Fail the next `create_session` calls with the given causes, in order
    pub fn fail_next_starts<I: IntoIterator<Item = StartFailure>>(&self, causes: I) {
        if let Ok(mut queue) = self.start_failures.lock() {
            queue.extend(causes);
        }
    }

    /// Delay every `create_session` call
    pub fn set_create_delay(&self, delay: Duration) {
        if let Ok(mut guard) = self.create_delay.lock() {
            *guard = Some(delay);
        }
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Make `delete_session` never complete
    pub fn set_hang_delete(&self, hang: bool) {
        self.hang_delete.store(hang, Ordering::SeqCst);
    }

    pub fn set_fail_app_commands(&self, fail: bool) {
        self.fail_app_commands.store(fail, Ordering::SeqCst);
    }

    /// Make liveness checks report sessions as gone
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Sessions created and not yet deleted
    pub fn live_sessions(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    /// `command:app_id` entries in call order
    pub fn app_commands(&self) -> Vec<String> {
        self.app_commands
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn last_capabilities(&self) -> Option<Capabilities> {
        self.last_capabilities
            .lock()
            .ok()
            .and_then(|caps| caps.clone())
    }

    fn record_app_command(&self, command: &str, app_id: &str) -> Result<(), Error> {
        if self.fail_app_commands.load(Ordering::SeqCst) {
            return Err(Error::driver(format!("{} rejected", command)));
        }
        self.app_commands
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .push(format!("{}:{}", command, app_id));
        Ok(())
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationDriver for MockDriver {
    async fn create_session(&self, capabilities: &Capabilities) -> Result<String, Error> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.create_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .start_failures
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .pop_front();
        if let Some(cause) = failure {
            return Err(Error::session_start(cause));
        }

        if let Ok(mut last) = self.last_capabilities.lock() {
            *last = Some(capabilities.clone());
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        self.live
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .insert(session_id.clone());
        Ok(session_id)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), Error> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.hang_delete.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }

        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::driver("delete rejected"));
        }

        self.live
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .remove(session_id);
        Ok(())
    }

    async fn session_alive(&self, session_id: &str) -> Result<bool, Error> {
        let known = self
            .live
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .contains(session_id);
        Ok(known && self.alive.load(Ordering::SeqCst))
    }

    async fn server_ready(&self) -> Result<bool, Error> {
        Ok(self.ready.load(Ordering::SeqCst))
    }

    async fn terminate_app(&self, _session_id: &str, app_id: &str) -> Result<(), Error> {
        self.record_app_command("terminate_app", app_id)
    }

    async fn activate_app(&self, _session_id: &str, app_id: &str) -> Result<(), Error> {
        self.record_app_command("activate_app", app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failures_consumed_in_order() {
        let driver = MockDriver::new();
        driver.fail_next_starts([
            StartFailure::DriverNotReady("a".into()),
            StartFailure::DeviceBooting("b".into()),
        ]);

        let caps = Capabilities::new();
        let first = driver.create_session(&caps).await.unwrap_err();
        assert!(matches!(
            first.start_failure(),
            Some(StartFailure::DriverNotReady(_))
        ));
        let second = driver.create_session(&caps).await.unwrap_err();
        assert!(matches!(
            second.start_failure(),
            Some(StartFailure::DeviceBooting(_))
        ));
        let id = driver.create_session(&caps).await.unwrap();

        assert_eq!(driver.create_calls(), 3);
        assert!(driver.session_alive(&id).await.unwrap());
        driver.delete_session(&id).await.unwrap();
        assert!(!driver.session_alive(&id).await.unwrap());
        assert_eq!(driver.live_sessions(), 0);
    }
}

//! Automation driver traits
//!
//! The seam between the session manager and the automation server.

use async_trait::async_trait;

use crate::profile::Capabilities;

/// Automation server client
///
/// `create_session` reports failures as `Error::SessionStart` with a
/// classified cause so the retry policy can tell transient start-up problems
/// from fatal ones.
#[async_trait]
pub trait AutomationDriver: Send + Sync + std::fmt::Debug {
    /// Start a session and return its server-side id
    async fn create_session(&self, capabilities: &Capabilities) -> Result<String, crate::Error>;

    /// End a session; deleting an unknown session is not an error
    async fn delete_session(&self, session_id: &str) -> Result<(), crate::Error>;

    /// Whether the server still knows the session
    async fn session_alive(&self, session_id: &str) -> Result<bool, crate::Error>;

    /// Whether the server accepts new sessions
    async fn server_ready(&self) -> Result<bool, crate::Error>;

    /// Stop the app under test
    async fn terminate_app(&self, session_id: &str, app_id: &str) -> Result<(), crate::Error>;

    /// Bring the app under test to the foreground, launching it if needed
    async fn activate_app(&self, session_id: &str, app_id: &str) -> Result<(), crate::Error>;
}

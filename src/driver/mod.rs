//! # Automation driver
//!
//! Client side of the automation server: session creation and deletion,
//! liveness checks and app lifecycle commands.
//!
//! - `traits`: the `AutomationDriver` seam
//! - `appium`: W3C WebDriver client for an Appium server
//! - `mock`: scripted driver for tests

pub mod traits;
pub mod appium;
pub mod mock;

pub use traits::AutomationDriver;
pub use appium::{classify_start_failure, AppiumDriver, W3cError};
pub use mock::MockDriver;

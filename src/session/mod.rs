//! # Session lifecycle
//!
//! Opens automation sessions on resolved devices, keeps at most one live
//! session per device, and tears sessions down on every exit path.
//!
//! ## Modules
//! - `state`: the `SessionState` machine
//! - `lease`: device leases enforcing one live session per device
//! - `handle`: the `Session` handle
//! - `manager`: `SessionManager` with retrying open and scoped acquisition
//! - `reset`: app reset strategies and the fallback chain
//!
//! ## Example
//! ```rust,no_run
//! use device_oxide::device::{DeviceResolver, StaticInventory};
//! use device_oxide::driver::AppiumDriver;
//! use device_oxide::profile::ProfileStore;
//! use device_oxide::session::SessionManager;
//! use futures::FutureExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> device_oxide::Result<()> {
//! let resolver = DeviceResolver::new(ProfileStore::global()?, Arc::new(StaticInventory::empty()));
//! let device = resolver.resolve_str("--device=pixel_6_api_33").await?;
//!
//! let manager = SessionManager::new(Arc::new(AppiumDriver::new("http://localhost:4723")?));
//! manager
//!     .with_session(&device, |session| {
//!         async move {
//!             assert!(session.is_open());
//!             Ok(())
//!         }
//!         .boxed()
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod state;
pub mod lease;
pub mod handle;
pub mod manager;
pub mod reset;


pub use state::SessionState;
pub use lease::{DeviceLease, DeviceLeases};
pub use handle::Session;
pub use manager::SessionManager;
pub use reset::{ClearAppData, ResetChain, ResetStrategy, RestartApp};

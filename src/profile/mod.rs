//! # Capability profiles
//!
//! Named, static device configurations and the capability sets they expand to.
//!
//! - `types`: platform, capability values and the profile record
//! - `store`: the read-only, lazily initialized profile store
//!
//! ```rust,no_run
//! use device_oxide::profile::ProfileStore;
//!
//! # fn example() -> device_oxide::Result<()> {
//! let store = ProfileStore::global()?;
//! let profile = store.get_profile("pixel_6_api_33")?;
//! let caps = profile.capabilities(store.common(), false)?;
//! println!("{} -> {} capabilities", profile.id, caps.len());
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod store;


pub use types::{locate_app, Capabilities, CapabilityProfile, CapabilityValue, Platform};
pub use store::{ProfileStore, APP_ROOT_ENV, AUTO_DETECT, PROFILES_ENV};

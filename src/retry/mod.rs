//! # Retry policy
//!
//! Wraps session start with bounded retries. Transient start-up failures
//! (timeouts, driver not ready, device still booting) are retried with fixed
//! or exponential backoff; anything else aborts on the spot.

pub mod policy;


pub use policy::{AttemptOutcome, AttemptRecord, Attempted, Backoff, RetryPolicy};

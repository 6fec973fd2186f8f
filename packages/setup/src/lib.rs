#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Delivery-coverage gating for the app's first screen.
//!
//! [`SetupStateMachine`] requests location permission, obtains a GPS fix,
//! resolves it to a delivery zone and settles on `Resolved` or
//! `Denied(reason)`. The UI observes the status and routes to the main app
//! or the coverage-unavailable screen; it never talks to the geometry store
//! directly.
//!
//! [`SessionCache`] remembers the last resolution for the life of the
//! process so that screens created later do not repeat the GPS and network
//! round-trips. It is never persisted.

pub mod cache;
pub mod config;
pub mod machine;

pub use cache::SessionCache;
pub use config::{ConfigError, SetupConfig};
pub use machine::SetupStateMachine;

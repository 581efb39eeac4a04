//! Persistent signing-secret provisioning for the SCIONLab coordinator.
//!
//! The coordinator needs one stable secret to sign sessions and CSRF tokens.
//! [`obtain_secret`] returns it, creating `run/SECRET.key` on first start.
//! Concurrent first starts converge on a single persisted value.
//!
//! ## Modules
//! - `cli` — Command-line handlers
//! - `core` — Provisioning, rotation, journal, deployment layout
//! - `models` — Settings file model
//! - `util` — Filesystem helpers

pub mod cli;
pub mod constants;
pub mod core;
pub mod error;
pub mod models;
pub mod util;

pub use crate::core::provisioner::{obtain_secret, Provisioned, SecretProvisioner};
pub use crate::core::secret::Secret;
pub use crate::error::SecretError;

//! Core provisioning logic.

pub mod file_lock;
pub mod journal;
pub mod paths;
pub mod provisioner;
pub mod rotation;
pub mod secret;
pub mod settings;

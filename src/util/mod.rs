//! Filesystem helpers shared by the CLI and the provisioner.

pub mod fs;

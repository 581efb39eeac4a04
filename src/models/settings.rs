//! Settings file model (`scionlab-secret.toml`).

use crate::constants;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub secret: SecretSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretSection {
    /// Absolute path overriding `<base>/run/SECRET.key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Length of generated secrets.
    #[serde(default = "default_length")]
    pub length: usize,

    /// Loaded secrets shorter than this produce a warning.
    #[serde(default = "default_length")]
    pub min_length: usize,

    /// Record provisioning events in the operations journal.
    #[serde(default = "default_journal")]
    pub journal: bool,
}

impl Default for SecretSection {
    fn default() -> Self {
        Self {
            path: None,
            length: default_length(),
            min_length: default_length(),
            journal: default_journal(),
        }
    }
}

fn default_length() -> usize {
    constants::SECRET_LENGTH
}

fn default_journal() -> bool {
    true
}

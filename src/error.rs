//! Error taxonomy of the provisioning library.
//!
//! A missing secret file is not an error: it is the signal to generate.
//! Every variant here is fatal for process startup and names the path
//! the operator has to fix.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretError {
    /// The file exists but could not be read.
    #[error("cannot read secret file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A fresh secret was generated but could not be persisted.
    #[error("could not open {path} for writing: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but holds nothing usable.
    #[error("secret file {path} is empty")]
    Empty { path: PathBuf },

    /// The file is larger than any secret this tool would write.
    #[error("secret file {path} is {size} bytes (limit {limit})")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    /// The configured location has no parent directory to write into.
    #[error("secret path {0} has no parent directory")]
    NoParent(PathBuf),
}

impl SecretError {
    /// Path the operator has to look at.
    pub fn path(&self) -> &std::path::Path {
        match self {
            SecretError::Read { path, .. }
            | SecretError::Write { path, .. }
            | SecretError::Empty { path }
            | SecretError::TooLarge { path, .. }
            | SecretError::NoParent(path) => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, SecretError>;

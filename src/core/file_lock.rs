//! Advisory flock(2) locks serializing operator actions on the secret.
//!
//! The provisioner never takes these; it relies on exclusive-create instead.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// An exclusive lock held until drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    _file: File,
}

impl FileLock {
    /// Block until the lock is ours.
    pub fn exclusive(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()
            .with_context(|| format!("acquire lock {}", path.display()))?;
        tracing::debug!(lock = %path.display(), "lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    /// `Ok(None)` when another process holds the lock.
    pub fn try_exclusive(path: &Path) -> Result<Option<Self>> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                _file: file,
            })),
            Err(e) if is_contended(&e) => {
                tracing::debug!(lock = %path.display(), "lock busy");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("try lock {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("open lock file {}", path.display()))
}

fn is_contended(e: &io::Error) -> bool {
    // fs2 surfaces EAGAIN as Other on some platforms
    e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == Some(11)
}

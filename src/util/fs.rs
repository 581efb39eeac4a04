//! Permission-aware filesystem helpers. Modes are no-ops off unix.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Create `path` (and missing parents) and apply `mode`.
pub fn ensure_dir(path: &Path, mode: u32) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("create runtime directory {}", path.display()))?;
    set_permissions(path, mode)
}

pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    apply_mode(path, mode).with_context(|| format!("chmod {:04o} {}", mode, path.display()))
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Permission bits of `path`, or `None` when unavailable.
#[cfg(unix)]
pub fn mode(path: &Path) -> Option<u32> {
    fs::metadata(path)
        .ok()
        .map(|meta| meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
pub fn mode(_path: &Path) -> Option<u32> {
    None
}

/// Whether mode bits actually deny access here (false for root).
#[cfg(all(test, unix))]
pub(crate) fn permissions_enforced(dir: &Path) -> bool {
    let canary = dir.join(".canary");
    if fs::write(&canary, b"x").is_err() {
        return false;
    }
    let denied = apply_mode(&canary, 0o000).is_ok() && fs::read(&canary).is_err();
    let _ = apply_mode(&canary, 0o600);
    let _ = fs::remove_file(&canary);
    denied
}

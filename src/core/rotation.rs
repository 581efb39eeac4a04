//! Operator-driven replacement of the stored secret.
//!
//! Rotation keeps exactly one backup (`<secret>.prev`). Both actions run
//! under the secret lock so two operators cannot interleave.

use crate::constants;
use crate::core::file_lock::FileLock;
use crate::core::paths::DeploymentPaths;
use crate::core::provisioner::{read_stored, stage};
use crate::core::secret::Secret;
use anyhow::{bail, Context, Result};
use std::fs;

#[derive(Debug)]
pub struct Rotated {
    pub secret: Secret,
    pub previous_fingerprint: Option<String>,
}

/// Replace the secret with a fresh one, backing up the current value.
///
/// Both files are staged before either is renamed into place, so a
/// rotation that cannot write leaves the secret and any older backup as
/// they were.
pub fn rotate(paths: &DeploymentPaths, length: usize) -> Result<Rotated> {
    let _lock = acquire(paths)?;

    let previous = read_stored(&paths.secret_file)?;
    let fresh = Secret::generate(length.max(constants::SECRET_LENGTH));
    let staged_secret = stage(&paths.secret_file, &fresh)?;
    let staged_backup = previous
        .as_ref()
        .map(|current| stage(&paths.secret_prev, current))
        .transpose()?;

    if let Some(backup) = staged_backup {
        backup.persist(&paths.secret_prev).map_err(|e| e.error).with_context(|| {
            format!(
                "backup {} to {}",
                paths.secret_file.display(),
                paths.secret_prev.display()
            )
        })?;
    }
    staged_secret
        .persist(&paths.secret_file)
        .map_err(|e| e.error)
        .with_context(|| format!("replace {}", paths.secret_file.display()))?;

    let previous_fingerprint = previous.map(|s| s.fingerprint());
    tracing::info!(
        path = %paths.secret_file.display(),
        fingerprint = %fresh.fingerprint(),
        previous = previous_fingerprint.as_deref().unwrap_or("-"),
        "secret rotated"
    );
    Ok(Rotated {
        secret: fresh,
        previous_fingerprint,
    })
}

/// Restore `<secret>.prev` over the current secret.
pub fn rollback(paths: &DeploymentPaths) -> Result<Secret> {
    let _lock = acquire(paths)?;

    let restored = match read_stored(&paths.secret_prev)? {
        Some(secret) if !secret.is_empty() => secret,
        Some(_) => bail!("backup {} is empty, refusing rollback", paths.secret_prev.display()),
        None => bail!(
            "no backup found at {}, cannot rollback",
            paths.secret_prev.display()
        ),
    };

    fs::rename(&paths.secret_prev, &paths.secret_file).with_context(|| {
        format!(
            "restore {} from {}",
            paths.secret_file.display(),
            paths.secret_prev.display()
        )
    })?;

    tracing::info!(
        path = %paths.secret_file.display(),
        fingerprint = %restored.fingerprint(),
        "secret rolled back"
    );
    Ok(restored)
}

/// Fail fast instead of queueing behind another operator.
fn acquire(paths: &DeploymentPaths) -> Result<FileLock> {
    match FileLock::try_exclusive(&paths.secret_lock)? {
        Some(lock) => Ok(lock),
        None => bail!(
            "{} is held by another process; is a rotation already running?",
            paths.secret_lock.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provisioner::obtain_secret;
    use tempfile::TempDir;

    fn test_paths() -> (TempDir, DeploymentPaths) {
        let dir = TempDir::new().unwrap();
        let paths = DeploymentPaths::from_base(dir.path().to_path_buf());
        fs::create_dir_all(&paths.run_dir).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_rotate_replaces_and_backs_up() {
        let (_dir, paths) = test_paths();
        let original = obtain_secret(&paths.secret_file).unwrap();
        let rotated = rotate(&paths, constants::SECRET_LENGTH).unwrap();

        assert_ne!(rotated.secret, original);
        assert_eq!(rotated.previous_fingerprint, Some(original.fingerprint()));
        assert_eq!(fs::read_to_string(&paths.secret_prev).unwrap(), original.expose());
        assert_eq!(obtain_secret(&paths.secret_file).unwrap(), rotated.secret);
    }

    #[test]
    fn test_rotate_without_existing_secret() {
        let (_dir, paths) = test_paths();
        let rotated = rotate(&paths, 64).unwrap();
        assert!(rotated.previous_fingerprint.is_none());
        assert_eq!(rotated.secret.len(), 64);
        assert!(!paths.secret_prev.exists());
    }

    #[test]
    fn test_rollback_restores_previous() {
        let (_dir, paths) = test_paths();
        let original = obtain_secret(&paths.secret_file).unwrap();
        rotate(&paths, constants::SECRET_LENGTH).unwrap();
        let restored = rollback(&paths).unwrap();
        assert_eq!(restored, original);
        assert_eq!(obtain_secret(&paths.secret_file).unwrap(), original);
        assert!(!paths.secret_prev.exists());
    }

    #[test]
    fn test_rotate_refuses_while_locked() {
        let (_dir, paths) = test_paths();
        let original = obtain_secret(&paths.secret_file).unwrap();
        let _held = FileLock::exclusive(&paths.secret_lock).unwrap();
        let err = rotate(&paths, constants::SECRET_LENGTH).unwrap_err();
        assert!(err.to_string().contains("held by another process"));
        assert_eq!(obtain_secret(&paths.secret_file).unwrap(), original);
    }

    #[test]
    fn test_rotate_raises_short_length() {
        let (_dir, paths) = test_paths();
        let rotated = rotate(&paths, 8).unwrap();
        assert_eq!(rotated.secret.len(), constants::SECRET_LENGTH);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_rotate_keeps_secret_and_backup() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, paths) = test_paths();
        if !crate::util::fs::permissions_enforced(&paths.run_dir) {
            return; // root writes into read-only directories
        }
        obtain_secret(&paths.secret_file).unwrap();
        rotate(&paths, constants::SECRET_LENGTH).unwrap();
        let current = fs::read_to_string(&paths.secret_file).unwrap();
        let backup = fs::read_to_string(&paths.secret_prev).unwrap();

        fs::set_permissions(&paths.run_dir, fs::Permissions::from_mode(0o500)).unwrap();
        let result = rotate(&paths, constants::SECRET_LENGTH);
        fs::set_permissions(&paths.run_dir, fs::Permissions::from_mode(0o750)).unwrap();

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&paths.secret_file).unwrap(), current);
        assert_eq!(fs::read_to_string(&paths.secret_prev).unwrap(), backup);
    }

    #[test]
    fn test_rollback_without_backup_fails() {
        let (_dir, paths) = test_paths();
        obtain_secret(&paths.secret_file).unwrap();
        let err = rollback(&paths).unwrap_err();
        assert!(err.to_string().contains("no backup"));
    }
}

//! Lazy, persistent provisioning of the coordinator signing secret.
//!
//! The first process to start writes the secret; every later start (and
//! every concurrent worker that lost the race) reads it back. A stored
//! secret is never overwritten from here.

use crate::constants;
use crate::core::secret::Secret;
use crate::error::{Result, SecretError};
use crate::util::fs as secret_fs;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::NamedTempFile;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// How a secret was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// Read from an existing file.
    Loaded,
    /// Generated and persisted by this call.
    Generated,
    /// Generated, but another process persisted first; its value was adopted.
    Converged,
}

impl Provisioned {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provisioned::Loaded => "loaded",
            Provisioned::Generated => "generated",
            Provisioned::Converged => "converged",
        }
    }
}

impl std::fmt::Display for Provisioned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) enum Persisted {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct SecretProvisioner {
    path: PathBuf,
    length: usize,
    min_length: usize,
}

impl SecretProvisioner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            length: constants::SECRET_LENGTH,
            min_length: constants::SECRET_LENGTH,
        }
    }

    /// Length of newly generated secrets, never below the policy minimum.
    pub fn with_length(mut self, length: usize) -> Self {
        if length < constants::SECRET_LENGTH {
            tracing::warn!(
                requested = length,
                minimum = constants::SECRET_LENGTH,
                "secret length raised to minimum"
            );
        }
        self.length = length.max(constants::SECRET_LENGTH);
        self
    }

    /// Loaded secrets shorter than this are accepted with a warning.
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the stored secret, creating it on first use.
    pub fn obtain(&self) -> Result<(Secret, Provisioned)> {
        if let Some(secret) = read_stored(&self.path)? {
            if secret.is_empty() {
                return Err(SecretError::Empty {
                    path: self.path.clone(),
                });
            }
            self.inspect_loaded(&secret);
            tracing::debug!(
                path = %self.path.display(),
                fingerprint = %secret.fingerprint(),
                "loaded secret"
            );
            return Ok((secret, Provisioned::Loaded));
        }

        let fresh = Secret::generate(self.length);
        match persist_new(&self.path, &fresh)? {
            Persisted::Created => {
                tracing::info!(
                    path = %self.path.display(),
                    fingerprint = %fresh.fingerprint(),
                    "generated new secret"
                );
                Ok((fresh, Provisioned::Generated))
            }
            Persisted::AlreadyExists => {
                drop(fresh);
                tracing::debug!(
                    path = %self.path.display(),
                    "secret appeared concurrently, adopting stored value"
                );
                let secret = self.converge()?;
                Ok((secret, Provisioned::Converged))
            }
        }
    }

    fn converge(&self) -> Result<Secret> {
        let mut missing = false;
        for attempt in 0..constants::CONVERGE_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(constants::CONVERGE_DELAY);
            }
            match read_stored(&self.path)? {
                Some(secret) if !secret.is_empty() => {
                    tracing::info!(
                        path = %self.path.display(),
                        fingerprint = %secret.fingerprint(),
                        attempt,
                        "converged on persisted secret"
                    );
                    return Ok(secret);
                }
                Some(_) => missing = false,
                None => missing = true,
            }
        }
        if missing {
            return Err(SecretError::Read {
                path: self.path.clone(),
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    "secret file vanished after a concurrent write",
                ),
            });
        }
        Err(SecretError::Empty {
            path: self.path.clone(),
        })
    }

    fn inspect_loaded(&self, secret: &Secret) {
        if secret.len() < self.min_length {
            tracing::warn!(
                path = %self.path.display(),
                length = secret.len(),
                minimum = self.min_length,
                "stored secret is shorter than recommended"
            );
        }
        if let Some(mode) = secret_fs::mode(&self.path) {
            if mode & 0o077 != 0 {
                tracing::warn!(
                    path = %self.path.display(),
                    mode = %format!("{:04o}", mode),
                    "secret file is accessible to group or others"
                );
            }
        }
    }
}

/// Return the secret stored at `path`, creating it on first use.
pub fn obtain_secret(path: &Path) -> Result<Secret> {
    SecretProvisioner::new(path).obtain().map(|(secret, _)| secret)
}

/// Read the stored secret. `Ok(None)` means the file does not exist.
pub fn read_stored(path: &Path) -> Result<Option<Secret>> {
    let read_err = |source: io::Error| SecretError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(read_err(e)),
    };
    let meta = file.metadata().map_err(read_err)?;
    if !meta.is_file() {
        return Err(read_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    if meta.len() > constants::MAX_SECRET_SIZE {
        return Err(SecretError::TooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit: constants::MAX_SECRET_SIZE,
        });
    }

    let mut raw = String::new();
    file.read_to_string(&mut raw).map_err(read_err)?;
    Ok(Some(Secret::from_stored(raw)))
}

/// Write `secret` to `path` unless something is already there.
///
/// The value lands in a temp file first and is linked into place, so a
/// concurrent reader sees either nothing or the complete secret.
pub(crate) fn persist_new(path: &Path, secret: &Secret) -> Result<Persisted> {
    let tmp = stage(path, secret)?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(Persisted::Created),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(Persisted::AlreadyExists),
        Err(e) => Err(SecretError::Write {
            path: path.to_path_buf(),
            source: e.error,
        }),
    }
}

/// Synced temp file next to `path` holding the secret, mode 0600.
pub(crate) fn stage(path: &Path, secret: &Secret) -> Result<NamedTempFile> {
    let write_err = |source: io::Error| SecretError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(SecretError::NoParent(path.to_path_buf())),
    };
    let prefix = format!(
        ".{}.",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(constants::SECRET_FILE_NAME)
    );
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_err)?;

    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(constants::SECRET_FILE_MODE);
        tmp.as_file().set_permissions(perm).map_err(write_err)?;
    }

    tmp.write_all(secret.expose().as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn secret_path(dir: &TempDir) -> PathBuf {
        dir.path().join(constants::SECRET_FILE_NAME)
    }

    #[test]
    fn test_first_run_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        let (secret, how) = SecretProvisioner::new(&path).obtain().unwrap();
        assert_eq!(how, Provisioned::Generated);
        assert!(path.is_file());
        assert!(secret.len() >= constants::SECRET_LENGTH);
        assert_eq!(fs::read_to_string(&path).unwrap(), secret.expose());
    }

    #[test]
    fn test_second_call_only_reads() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        let first = obtain_secret(&path).unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();

        let (second, how) = SecretProvisioner::new(&path).obtain().unwrap();
        assert_eq!(how, Provisioned::Loaded);
        assert_eq!(first, second);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_trailing_whitespace_stripped() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        fs::write(&path, "abc123\n").unwrap();
        assert_eq!(obtain_secret(&path).unwrap().expose(), "abc123");
        assert_eq!(fs::read_to_string(&path).unwrap(), "abc123\n");
    }

    #[test]
    fn test_unreadable_path_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        fs::create_dir(&path).unwrap();
        let err = obtain_secret(&path).unwrap_err();
        assert!(matches!(err, SecretError::Read { .. }), "got {:?}", err);
        assert!(path.is_dir());
    }

    #[test]
    fn test_missing_parent_is_write_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join(constants::SECRET_FILE_NAME);
        let err = obtain_secret(&path).unwrap_err();
        assert!(matches!(err, SecretError::Write { .. }), "got {:?}", err);
        assert!(err.to_string().contains(&path.display().to_string()));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        fs::write(&path, "  \n").unwrap();
        let err = obtain_secret(&path).unwrap_err();
        assert!(matches!(err, SecretError::Empty { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "  \n");
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        fs::write(&path, "x".repeat(constants::MAX_SECRET_SIZE as usize + 1)).unwrap();
        let err = obtain_secret(&path).unwrap_err();
        assert!(matches!(err, SecretError::TooLarge { .. }));
    }

    #[test]
    fn test_persist_new_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        fs::write(&path, "winner").unwrap();
        let loser = Secret::generate(constants::SECRET_LENGTH);
        assert!(matches!(
            persist_new(&path, &loser).unwrap(),
            Persisted::AlreadyExists
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "winner");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_generated_file_mode() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        obtain_secret(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, constants::SECRET_FILE_MODE);
    }

    #[test]
    fn test_custom_length() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        let (secret, _) = SecretProvisioner::new(&path)
            .with_length(64)
            .obtain()
            .unwrap();
        assert_eq!(secret.len(), 64);
    }

    #[test]
    fn test_short_length_raised_to_minimum() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        let (secret, how) = SecretProvisioner::new(&path)
            .with_length(0)
            .obtain()
            .unwrap();
        assert_eq!(how, Provisioned::Generated);
        assert_eq!(secret.len(), constants::SECRET_LENGTH);

        // the stored value stays usable on the next start
        let (again, how) = SecretProvisioner::new(&path).obtain().unwrap();
        assert_eq!(how, Provisioned::Loaded);
        assert_eq!(again, secret);
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_is_read_error() {
        let dir = TempDir::new().unwrap();
        if !secret_fs::permissions_enforced(dir.path()) {
            return; // root reads through mode 000
        }
        let path = secret_path(&dir);
        fs::write(&path, "abc123").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        let err = obtain_secret(&path).unwrap_err();
        let denied = matches!(
            &err,
            SecretError::Read { source, .. } if source.kind() == io::ErrorKind::PermissionDenied
        );

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        assert!(denied, "got {:?}", err);
        assert_eq!(fs::read_to_string(&path).unwrap(), "abc123");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_non_utf8_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let err = obtain_secret(&path).unwrap_err();
        assert!(matches!(err, SecretError::Read { .. }), "got {:?}", err);
        assert_eq!(fs::read(&path).unwrap(), vec![0xff, 0xfe, 0x00, 0x80]);
    }

    #[test]
    fn test_read_stored_missing() {
        let dir = TempDir::new().unwrap();
        assert!(read_stored(&secret_path(&dir)).unwrap().is_none());
    }
}

//! Centralized constants for permissions, paths, and secret policy.

use std::time::Duration;

/// Default coordinator base directory.
pub const DEFAULT_BASE_DIR: &str = "/opt/scionlab";

/// Environment variable overriding the base directory.
pub const BASE_DIR_ENV: &str = "SCIONLAB_BASE_DIR";

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "SCIONLAB_SECRET_LOG";

/// Runtime directory below the base directory.
pub const RUN_DIR_NAME: &str = "run";

/// Secret key file name inside the runtime directory.
pub const SECRET_FILE_NAME: &str = "SECRET.key";

/// Optional settings file inside the base directory.
pub const SETTINGS_FILE_NAME: &str = "scionlab-secret.toml";

/// Maintenance-mode state file written by the web application.
pub const MAINTENANCE_STATE_FILE_NAME: &str = "maintenance_mode_state.txt";

/// Operations journal inside the runtime directory.
pub const JOURNAL_FILE_NAME: &str = "secret-journal.log";

/// Permission mode for the runtime directory.
pub const RUN_DIR_MODE: u32 = 0o750;

/// Permission mode for the secret file.
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Permission mode for the journal.
pub const JOURNAL_MODE: u32 = 0o640;

/// Length of generated secrets.
pub const SECRET_LENGTH: usize = 50;

/// Alphabet generated secrets are drawn from.
pub const SECRET_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*(-_=+)";

/// Upper bound on what is accepted as a stored secret (64 KiB).
pub const MAX_SECRET_SIZE: u64 = 65_536;

/// Re-read attempts after losing the first-run race to another writer.
pub const CONVERGE_ATTEMPTS: u32 = 20;

/// Pause between convergence re-reads.
pub const CONVERGE_DELAY: Duration = Duration::from_millis(25);

/// Hex characters of the SHA-256 fingerprint shown to operators.
pub const FINGERPRINT_LEN: usize = 16;

//! Coordinator deployment layout.

use crate::constants;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DeploymentPaths {
    pub base: PathBuf,
    pub run_dir: PathBuf,
    pub secret_file: PathBuf,
    pub secret_prev: PathBuf,
    pub secret_lock: PathBuf,
    pub journal: PathBuf,
    pub journal_lock: PathBuf,
    pub settings: PathBuf,
    pub maintenance_state: PathBuf,
}

impl DeploymentPaths {
    /// Resolve the base directory from CLI arg, env var, or auto-detection.
    pub fn resolve(base_arg: Option<PathBuf>) -> Result<Self> {
        if let Some(base) = base_arg {
            return Ok(Self::from_base(base));
        }
        if let Ok(base) = env::var(constants::BASE_DIR_ENV) {
            if !base.is_empty() {
                return Ok(Self::from_base(PathBuf::from(base)));
            }
        }
        if let Some(found) = find_base_dir()? {
            return Ok(Self::from_base(found));
        }
        Ok(Self::from_base(PathBuf::from(constants::DEFAULT_BASE_DIR)))
    }

    pub fn from_base(base: PathBuf) -> Self {
        let run_dir = base.join(constants::RUN_DIR_NAME);
        let secret_file = run_dir.join(constants::SECRET_FILE_NAME);
        Self::with_secret_file(base, secret_file)
    }

    /// Layout with the secret stored somewhere other than `run/`.
    ///
    /// Backup and lock files follow the secret; the journal stays in `run/`.
    pub fn with_secret_file(base: PathBuf, secret_file: PathBuf) -> Self {
        let run_dir = base.join(constants::RUN_DIR_NAME);
        let secret_prev = sibling(&secret_file, ".prev");
        let secret_lock = sibling(&secret_file, ".lock");
        let journal = run_dir.join(constants::JOURNAL_FILE_NAME);
        let journal_lock = sibling(&journal, ".lock");
        let settings = base.join(constants::SETTINGS_FILE_NAME);
        let maintenance_state = run_dir.join(constants::MAINTENANCE_STATE_FILE_NAME);
        Self {
            base,
            run_dir,
            secret_file,
            secret_prev,
            secret_lock,
            journal,
            journal_lock,
            settings,
            maintenance_state,
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn find_base_dir() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir().context("resolve current directory")?;
    for ancestor in cwd.ancestors() {
        if looks_like_base(ancestor) {
            return Ok(Some(ancestor.to_path_buf()));
        }
    }
    Ok(None)
}

fn looks_like_base(path: &Path) -> bool {
    path.join(constants::SETTINGS_FILE_NAME).is_file()
        || path
            .join(constants::RUN_DIR_NAME)
            .join(constants::SECRET_FILE_NAME)
            .is_file()
}

impl std::fmt::Display for DeploymentPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scionlab@{}", self.base.display())
    }
}

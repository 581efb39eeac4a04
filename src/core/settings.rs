//! Loading and saving `scionlab-secret.toml`.

use crate::constants;
use crate::core::paths::DeploymentPaths;
use crate::models::settings::SettingsFile;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Load settings; a missing file yields defaults.
pub fn load(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("read settings {}", path.display()))?;
    let settings: SettingsFile = toml::from_str(&content)
        .with_context(|| format!("parse settings {}", path.display()))?;
    validate(&settings).with_context(|| format!("invalid settings {}", path.display()))?;
    Ok(settings)
}

pub fn validate(settings: &SettingsFile) -> Result<()> {
    let secret = &settings.secret;
    if let Some(path) = &secret.path {
        if !path.is_absolute() {
            bail!("secret.path must be absolute, got {}", path.display());
        }
    }
    if secret.length < constants::SECRET_LENGTH {
        bail!(
            "secret.length {} below minimum {}",
            secret.length,
            constants::SECRET_LENGTH
        );
    }
    Ok(())
}

pub fn save(path: &Path, settings: &SettingsFile) -> Result<()> {
    let content = toml::to_string_pretty(settings).context("serialize settings")?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent).context("create temp settings")?;
    tmp.write_all(content.as_bytes()).context("write settings")?;
    tmp.flush().ok();

    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(0o640);
        tmp.as_file()
            .set_permissions(perm)
            .context("set permissions on temp settings")?;
    }

    tmp.persist(path)
        .map_err(|err| anyhow::anyhow!("persist settings: {}", err))?;
    Ok(())
}

/// Apply the `secret.path` override to a resolved layout.
pub fn apply(paths: DeploymentPaths, settings: &SettingsFile) -> DeploymentPaths {
    match &settings.secret.path {
        Some(secret_file) => DeploymentPaths::with_secret_file(paths.base, secret_file.clone()),
        None => paths,
    }
}

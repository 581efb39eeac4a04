//! Read-only diagnostics for the secret and its runtime directory.

use crate::cli::CliContext;
use crate::constants;
use crate::core::journal;
use crate::core::provisioner::read_stored;
use crate::util::fs as secret_fs;
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::fs;
use std::io;

/// Below this estimate a stored secret is flagged.
const MIN_ENTROPY_BITS: f64 = 128.0;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format: text|json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Pass,
    Warn,
    Fail,
    Info,
}

impl Level {
    fn tag(&self) -> &'static str {
        match self {
            Level::Pass => "[PASS]",
            Level::Warn => "[WARN]",
            Level::Fail => "[FAIL]",
            Level::Info => "[INFO]",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub level: Level,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, level: Level, detail: impl Into<String>) -> Self {
        Self {
            name,
            level,
            detail: detail.into(),
        }
    }
}

pub fn run(ctx: &CliContext, args: StatusArgs) -> Result<()> {
    let checks = collect(ctx);

    match args.format.as_str() {
        "json" => {
            let out = serde_json::to_string_pretty(&checks).context("serialize status")?;
            println!("{}", out);
        }
        "text" => {
            println!("Status: {}", ctx.paths);
            for check in &checks {
                println!("  {} {}: {}", check.level.tag(), check.name, check.detail);
            }
            let count = |level: Level| checks.iter().filter(|c| c.level == level).count();
            println!();
            println!(
                "Status summary: {} pass, {} warn, {} fail",
                count(Level::Pass),
                count(Level::Warn),
                count(Level::Fail)
            );
        }
        other => bail!("unknown format '{}', expected text or json", other),
    }

    if checks.iter().any(|c| c.level == Level::Fail) {
        std::process::exit(1);
    }
    Ok(())
}

pub fn collect(ctx: &CliContext) -> Vec<Check> {
    let paths = &ctx.paths;
    let mut checks = Vec::new();

    if paths.run_dir.is_dir() {
        checks.push(Check::new("run_dir", Level::Pass, paths.run_dir.display().to_string()));
        if let Some(mode) = secret_fs::mode(&paths.run_dir) {
            if mode & 0o007 != 0 {
                checks.push(Check::new(
                    "run_dir_mode",
                    Level::Warn,
                    format!("{:04o} (expected {:04o})", mode, constants::RUN_DIR_MODE),
                ));
            }
        }
    } else {
        checks.push(Check::new(
            "run_dir",
            Level::Fail,
            format!("{} missing (run: scionlab-secret init)", paths.run_dir.display()),
        ));
    }

    match read_stored(&paths.secret_file) {
        Ok(None) => checks.push(Check::new(
            "secret",
            Level::Warn,
            format!(
                "{} not provisioned yet (created on first start)",
                paths.secret_file.display()
            ),
        )),
        Ok(Some(secret)) if secret.is_empty() => checks.push(Check::new(
            "secret",
            Level::Fail,
            format!("{} is empty", paths.secret_file.display()),
        )),
        Ok(Some(secret)) => {
            checks.push(Check::new(
                "secret",
                Level::Pass,
                format!("sha256:{}", secret.fingerprint()),
            ));
            checks.push(secret_mode_check(ctx));
            let min = ctx.settings.secret.min_length;
            checks.push(if secret.len() >= min {
                Check::new("secret_length", Level::Pass, secret.len().to_string())
            } else {
                Check::new(
                    "secret_length",
                    Level::Warn,
                    format!("{} (recommended at least {})", secret.len(), min),
                )
            });
            let bits = secret.estimated_entropy_bits();
            checks.push(if bits >= MIN_ENTROPY_BITS {
                Check::new("secret_entropy", Level::Pass, format!("~{:.0} bits", bits))
            } else {
                Check::new(
                    "secret_entropy",
                    Level::Warn,
                    format!("~{:.0} bits (recommended {:.0})", bits, MIN_ENTROPY_BITS),
                )
            });
        }
        Err(e) => checks.push(Check::new("secret", Level::Fail, e.to_string())),
    }

    if paths.secret_prev.is_file() {
        checks.push(Check::new(
            "backup",
            Level::Info,
            format!("{} (rollback available)", paths.secret_prev.display()),
        ));
    }

    checks.push(maintenance_check(ctx));

    if paths.journal.exists() {
        match journal::verify_chain(paths) {
            Ok((total, errors)) if errors.is_empty() => {
                checks.push(Check::new("journal", Level::Pass, format!("{} entries", total)))
            }
            Ok((total, errors)) => checks.push(Check::new(
                "journal",
                Level::Warn,
                format!("{} entries, {} chain errors", total, errors.len()),
            )),
            Err(e) => checks.push(Check::new("journal", Level::Warn, format!("{:#}", e))),
        }
    }

    checks
}

fn secret_mode_check(ctx: &CliContext) -> Check {
    match secret_fs::mode(&ctx.paths.secret_file) {
        Some(mode) if mode == constants::SECRET_FILE_MODE || mode == 0o400 => {
            Check::new("secret_mode", Level::Pass, format!("{:04o}", mode))
        }
        Some(mode) if mode & 0o004 != 0 => Check::new(
            "secret_mode",
            Level::Fail,
            format!("{:04o} is world-readable", mode),
        ),
        Some(mode) => Check::new(
            "secret_mode",
            Level::Warn,
            format!("{:04o} (expected {:04o})", mode, constants::SECRET_FILE_MODE),
        ),
        None => Check::new("secret_mode", Level::Info, "not available on this platform"),
    }
}

/// The web application toggles maintenance mode by writing `0`/`1` here.
fn maintenance_check(ctx: &CliContext) -> Check {
    let path = &ctx.paths.maintenance_state;
    match fs::read_to_string(path) {
        Ok(raw) => match raw.trim() {
            "1" => Check::new("maintenance_mode", Level::Info, "on"),
            "0" | "" => Check::new("maintenance_mode", Level::Info, "off"),
            other => Check::new(
                "maintenance_mode",
                Level::Warn,
                format!("unrecognized state '{}' in {}", other, path.display()),
            ),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Check::new("maintenance_mode", Level::Info, "off (no state file)")
        }
        Err(e) => Check::new(
            "maintenance_mode",
            Level::Warn,
            format!("cannot read {}: {}", path.display(), e),
        ),
    }
}

//! CLI routing and command dispatch.

use crate::core::journal::{self, Event};
use crate::core::paths::DeploymentPaths;
use crate::core::settings;
use crate::models::settings::SettingsFile;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod init;
pub mod journal_cmd;
pub mod provision;
pub mod rotate;
pub mod status;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub paths: DeploymentPaths,
    pub settings: SettingsFile,
    pub non_interactive: bool,
}

impl CliContext {
    /// Journal a successful event. Failures are reported, never fatal.
    pub fn journal(&self, event: Event, fingerprint: Option<String>) {
        if !self.settings.secret.journal {
            return;
        }
        if let Err(e) = journal::record(&self.paths, event, fingerprint) {
            tracing::warn!(event = event.as_str(), "journal write failed: {:#}", e);
        }
    }

    pub fn journal_failure(&self, event: Event, error: &str) {
        if !self.settings.secret.journal {
            return;
        }
        if let Err(e) = journal::record_failure(&self.paths, event, error) {
            tracing::warn!(event = event.as_str(), "journal write failed: {:#}", e);
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "scionlab-secret",
    version,
    about = "Provision the persistent signing secret of the SCIONLab coordinator"
)]
pub struct Cli {
    /// Coordinator base directory (contains run/)
    #[arg(long, global = true, value_name = "PATH")]
    pub base_dir: Option<PathBuf>,

    /// Run in non-interactive mode (no prompts, suitable for automation)
    #[arg(long, global = true, env = "SCIONLAB_SECRET_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let paths = DeploymentPaths::resolve(self.base_dir)?;
        let settings = settings::load(&paths.settings)?;
        let paths = settings::apply(paths, &settings);
        tracing::debug!(deployment = %paths, secret = %paths.secret_file.display(), "resolved layout");

        let ctx = CliContext {
            paths,
            settings,
            non_interactive: self.non_interactive,
        };

        match self.command {
            Commands::Init(args) => init::run(&ctx, args),
            Commands::Provision(args) => provision::run(&ctx, args),
            Commands::Status(args) => status::run(&ctx, args),
            Commands::Rotate(args) => rotate::run_rotate(&ctx, args),
            Commands::Rollback(args) => rotate::run_rollback(&ctx, args),
            Commands::Journal { command } => journal_cmd::run(&ctx, command),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the runtime directory and optionally the secret
    Init(init::InitArgs),
    /// Load the secret, creating it on first use (startup step)
    Provision(provision::ProvisionArgs),
    /// Diagnose the secret and its surroundings (read-only)
    Status(status::StatusArgs),
    /// Replace the secret with a fresh one (invalidates signed tokens)
    Rotate(rotate::RotateArgs),
    /// Restore the secret from before the last rotation
    Rollback(rotate::RollbackArgs),
    /// Inspect the operations journal
    Journal {
        #[command(subcommand)]
        command: journal_cmd::JournalCommand,
    },
}

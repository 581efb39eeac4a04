use crate::cli::{provision, CliContext};
use crate::constants;
use crate::core::settings;
use crate::util::fs as secret_fs;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Also create the secret right away
    #[arg(long)]
    pub provision: bool,

    /// Write a default settings file if none exists
    #[arg(long)]
    pub write_settings: bool,
}

pub fn run(ctx: &CliContext, args: InitArgs) -> Result<()> {
    let paths = &ctx.paths;
    secret_fs::ensure_dir(&paths.run_dir, constants::RUN_DIR_MODE)?;
    if let Some(parent) = paths.secret_file.parent() {
        if parent != paths.run_dir && !parent.is_dir() {
            secret_fs::ensure_dir(parent, constants::RUN_DIR_MODE)?;
        }
    }

    if args.write_settings && !paths.settings.exists() {
        settings::save(&paths.settings, &ctx.settings)?;
        println!("wrote {}", paths.settings.display());
    }

    println!("runtime directory ready at {}", paths.run_dir.display());

    if args.provision {
        provision::run(ctx, provision::ProvisionArgs::default())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::DeploymentPaths;
    use crate::models::settings::SettingsFile;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_run_dir_and_secret() {
        let dir = TempDir::new().unwrap();
        let ctx = CliContext {
            paths: DeploymentPaths::from_base(dir.path().to_path_buf()),
            settings: SettingsFile::default(),
            non_interactive: true,
        };
        run(
            &ctx,
            InitArgs {
                provision: true,
                write_settings: true,
            },
        )
        .unwrap();
        assert!(ctx.paths.run_dir.is_dir());
        assert!(ctx.paths.secret_file.is_file());
        assert!(ctx.paths.settings.is_file());
        assert!(ctx.paths.journal.is_file());
    }
}

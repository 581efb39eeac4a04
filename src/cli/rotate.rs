use crate::cli::CliContext;
use crate::core::journal::Event;
use crate::core::rotation;
use anyhow::{bail, Context, Result};
use clap::Args;
use dialoguer::Confirm;

#[derive(Args, Debug)]
pub struct RotateArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,

    /// Length of the new secret (defaults to the configured length)
    #[arg(long)]
    pub length: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

pub fn run_rotate(ctx: &CliContext, args: RotateArgs) -> Result<()> {
    let length = args.length.unwrap_or(ctx.settings.secret.length);
    let minimum = crate::constants::SECRET_LENGTH;
    if length < minimum {
        bail!("secret length {} below minimum {}", length, minimum);
    }

    confirm(
        ctx,
        args.yes,
        "Rotating invalidates every session and signed token. Continue?",
    )?;

    match rotation::rotate(&ctx.paths, length) {
        Ok(rotated) => {
            ctx.journal(Event::Rotate, Some(rotated.secret.fingerprint()));
            println!(
                "rotated {} (sha256:{}); restart all workers",
                ctx.paths.secret_file.display(),
                rotated.secret.fingerprint()
            );
            if let Some(prev) = rotated.previous_fingerprint {
                println!("previous secret kept at {} (sha256:{})", ctx.paths.secret_prev.display(), prev);
            }
            Ok(())
        }
        Err(e) => {
            ctx.journal_failure(Event::Rotate, &format!("{:#}", e));
            Err(e)
        }
    }
}

pub fn run_rollback(ctx: &CliContext, args: RollbackArgs) -> Result<()> {
    confirm(ctx, args.yes, "Restore the secret from before the last rotation?")?;

    match rotation::rollback(&ctx.paths) {
        Ok(restored) => {
            ctx.journal(Event::Rollback, Some(restored.fingerprint()));
            println!(
                "rolled back {} to sha256:{}; restart all workers",
                ctx.paths.secret_file.display(),
                restored.fingerprint()
            );
            Ok(())
        }
        Err(e) => {
            ctx.journal_failure(Event::Rollback, &format!("{:#}", e));
            Err(e)
        }
    }
}

fn confirm(ctx: &CliContext, yes: bool, prompt: &str) -> Result<()> {
    if yes {
        return Ok(());
    }
    if ctx.non_interactive {
        bail!("--non-interactive requires --yes");
    }
    let proceed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("read confirmation")?;
    if !proceed {
        bail!("aborted");
    }
    Ok(())
}

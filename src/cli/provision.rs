//! Startup provisioning: the step every coordinator deployment runs
//! before its workers come up.

use crate::cli::CliContext;
use crate::core::journal::Event;
use crate::core::provisioner::{Provisioned, SecretProvisioner};
use crate::error::SecretError;
use anyhow::{bail, Context, Result};
use clap::Args;
use std::io::Write;

#[derive(Args, Debug, Default)]
pub struct ProvisionArgs {
    /// Write the secret itself to stdout (requires --confirm)
    #[arg(long)]
    pub print: bool,

    /// Acknowledge that --print exposes the secret
    #[arg(long)]
    pub confirm: bool,
}

pub fn run(ctx: &CliContext, args: ProvisionArgs) -> Result<()> {
    if args.print && !args.confirm {
        bail!("refusing to print the secret without --confirm");
    }

    let paths = &ctx.paths;
    let provisioner = SecretProvisioner::new(&paths.secret_file)
        .with_length(ctx.settings.secret.length)
        .with_min_length(ctx.settings.secret.min_length);

    let (secret, how) = match provisioner.obtain() {
        Ok(found) => found,
        Err(e) => {
            ctx.journal_failure(failed_event(&e), &e.to_string());
            return Err(e).context("secret provisioning failed, startup must not continue");
        }
    };

    match how {
        Provisioned::Generated => ctx.journal(Event::Generate, Some(secret.fingerprint())),
        Provisioned::Converged => ctx.journal(Event::Converge, Some(secret.fingerprint())),
        Provisioned::Loaded => {}
    }

    if args.print {
        let mut out = std::io::stdout().lock();
        out.write_all(secret.expose().as_bytes())
            .context("write secret to stdout")?;
        out.flush().ok();
        return Ok(());
    }

    println!(
        "secret {} at {} (sha256:{})",
        how,
        paths.secret_file.display(),
        secret.fingerprint()
    );
    Ok(())
}

/// Write failures happen while persisting a new secret; everything else
/// is a problem with the stored one.
fn failed_event(err: &SecretError) -> Event {
    match err {
        SecretError::Write { .. } | SecretError::NoParent(_) => Event::Generate,
        SecretError::Read { .. } | SecretError::Empty { .. } | SecretError::TooLarge { .. } => {
            Event::Load
        }
    }
}

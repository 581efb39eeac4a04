use anyhow::Result;
use clap::Parser;
use scionlab_secret::constants;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = scionlab_secret::cli::Cli::parse();

    let filter = EnvFilter::try_from_env(constants::LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("scionlab_secret=debug")
        } else {
            EnvFilter::new("scionlab_secret=warn")
        }
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    cli.run()
}

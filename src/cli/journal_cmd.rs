use crate::cli::CliContext;
use crate::core::journal;
use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};

#[derive(Subcommand, Debug)]
pub enum JournalCommand {
    /// Display recent journal entries
    Log(JournalLogArgs),
    /// Verify the journal hash chain
    Verify,
}

#[derive(Args, Debug)]
pub struct JournalLogArgs {
    /// Maximum number of entries to display
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

pub fn run(ctx: &CliContext, cmd: JournalCommand) -> Result<()> {
    match cmd {
        JournalCommand::Log(args) => run_log(ctx, args),
        JournalCommand::Verify => run_verify(ctx),
    }
}

fn run_log(ctx: &CliContext, args: JournalLogArgs) -> Result<()> {
    let entries = journal::read(&ctx.paths, Some(args.limit))?;
    if entries.is_empty() {
        println!("No journal entries found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Timestamp").add_attribute(Attribute::Bold),
        Cell::new("Event").add_attribute(Attribute::Bold),
        Cell::new("Fingerprint").add_attribute(Attribute::Bold),
        Cell::new("Actor").add_attribute(Attribute::Bold),
        Cell::new("Host/PID").add_attribute(Attribute::Bold),
        Cell::new("Result").add_attribute(Attribute::Bold),
    ]);

    for entry in &entries {
        let local: DateTime<Local> = entry.timestamp.into();
        let result = if entry.outcome.success {
            "OK".to_string()
        } else {
            format!("FAIL: {}", entry.outcome.error.as_deref().unwrap_or("?"))
        };
        table.add_row(vec![
            local.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.event.as_str().to_string(),
            entry.fingerprint.clone().unwrap_or_else(|| "-".to_string()),
            entry.actor.clone(),
            format!("{}/{}", entry.host, entry.pid),
            result,
        ]);
    }

    println!("{}", table);
    println!("\n{} entries shown.", entries.len());
    Ok(())
}

fn run_verify(ctx: &CliContext) -> Result<()> {
    let (total, errors) = journal::verify_chain(&ctx.paths)?;
    if total == 0 {
        println!("No journal entries to verify.");
        return Ok(());
    }
    for err in &errors {
        println!("  [FAIL] {}", err);
    }
    if !errors.is_empty() {
        bail!("journal chain broken: {} of {} entries failed", errors.len(), total);
    }
    println!("Journal chain: {} entries verified, 0 errors", total);
    Ok(())
}

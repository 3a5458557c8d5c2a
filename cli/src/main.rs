//! commission-ledger: operator CLI for the commission ledger
//!
//! State lives in a JSON snapshot file between runs. Every command restores
//! the ledger from that file (or starts an empty ledger), runs, and writes
//! the snapshot back when something changed.

mod commands;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use commission_ledger_core_rs::{
    CommissionLedger, InMemoryCommissionStore, LedgerConfig, LedgerSnapshot, SystemClock,
};
use tracing::info;

use commands::{execute_command, Commands, Ledger};

#[derive(Parser)]
#[command(name = "commission-ledger")]
#[command(about = "Commission calculation, attribution and reconciliation")]
struct Cli {
    /// Path to a JSON ledger config (rates, house identity, attribution)
    #[arg(short, long, env = "COMMISSION_LEDGER_CONFIG")]
    config: Option<String>,

    /// Path to the ledger snapshot file
    #[arg(short, long, env = "COMMISSION_LEDGER_FILE", default_value = "commission-ledger.json")]
    ledger: String,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("commission_ledger=info".parse()?)
                .add_directive("commission_ledger_core_rs=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let content =
                std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            LedgerConfig::from_json(&content)?
        }
        None => {
            info!("No config file given, using the standard rate schedule");
            LedgerConfig::default()
        }
    };

    let mut ledger = load_ledger(config, &cli.ledger)?;
    let (output, changed) = execute_command(&mut ledger, cli.command)?;

    if changed {
        let snapshot = ledger.snapshot()?;
        std::fs::write(&cli.ledger, snapshot.to_json()?)
            .with_context(|| format!("writing {}", cli.ledger))?;
        info!(path = %cli.ledger, "ledger saved");
    }

    println!("{}", output);
    Ok(())
}

fn load_ledger(config: LedgerConfig, path: &str) -> anyhow::Result<Ledger> {
    if Path::new(path).exists() {
        let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        let snapshot = LedgerSnapshot::from_json(&content)?;
        let ledger = CommissionLedger::from_snapshot(config, snapshot, SystemClock)
            .with_context(|| format!("restoring {}", path))?;
        info!(path, "ledger restored");
        Ok(ledger)
    } else {
        info!(path, "ledger file not found, starting empty");
        Ok(CommissionLedger::new(
            config,
            InMemoryCommissionStore::new(),
            SystemClock,
        )?)
    }
}

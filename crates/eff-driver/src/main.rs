//! Effervescence Driver Harness
//!
//! Usage:
//!   eff-driver run                 - Run a scripted client session
//!   eff-driver dump-config         - Print (or write) the default config
//!
//! Set `RUST_LOG=debug` to see every task the queue processes.

mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eff_taskqueue::TaskQueueConfig;

use crate::session::SessionPlan;

#[derive(Parser)]
#[command(name = "eff-driver", about = "Effervescence task queue harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session against the reference client registry
    Run {
        /// Task queue config (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of clients to register
        #[arg(long, default_value_t = 4)]
        clients: u32,
        /// Start/stop rounds per client
        #[arg(long, default_value_t = 8)]
        rounds: u32,
        /// Do not ask for real-time promotion of the worker
        #[arg(long)]
        no_realtime: bool,
    },
    /// Print the default config as JSON
    DumpConfig {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            clients,
            rounds,
            no_realtime,
        } => {
            let mut config = load_config(config)?;
            if no_realtime {
                config.promote_realtime_worker = false;
            }
            run(config, SessionPlan { clients, rounds })
        }
        Commands::DumpConfig { output } => dump_config(output),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<TaskQueueConfig> {
    match path {
        Some(path) => TaskQueueConfig::load_from(&path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(TaskQueueConfig::default()),
    }
}

fn run(config: TaskQueueConfig, plan: SessionPlan) -> Result<()> {
    log::info!(
        "Starting session: {} clients, {} rounds",
        plan.clients,
        plan.rounds
    );

    let report = session::run(config, &plan)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing session report")?
    );
    Ok(())
}

fn dump_config(output: Option<PathBuf>) -> Result<()> {
    let config = TaskQueueConfig::default();

    match output {
        Some(path) => {
            config
                .save_to(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            log::info!("Wrote default config to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

//! CLI entry point for the capweight rebalancer.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use capweight_rebalancer::config::Config;
use capweight_rebalancer::error::Error;
use capweight_rebalancer::execution::{self, PlanOptions, SimulateOptions};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Market-cap weighted rebalancer: plan trades and replay history")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the trades that rebalance an exported portfolio
    Plan {
        /// Balance export CSV (Currency, Amount columns)
        #[arg(long, default_value = "balances.csv")]
        balances: PathBuf,

        /// Snapshot file to use instead of the cached latest snapshot
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Print the trade plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay the strategy over the cached snapshot history
    Simulate {
        /// First date to include (YYYY-MM-DD or YYYYMMDD)
        #[arg(long)]
        from: Option<String>,

        /// Last date to include (YYYY-MM-DD or YYYYMMDD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Show target weights for a snapshot
    Targets {
        /// Snapshot file to use instead of the cached latest snapshot
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Plan {
            balances,
            snapshot,
            json,
        } => execution::run_plan(
            &config,
            &PlanOptions {
                balances,
                snapshot,
                json,
            },
        ),
        Command::Simulate { from, to } => {
            execution::run_simulation(&config, &SimulateOptions { from, to }).map(|_| ())
        }
        Command::Targets { snapshot } => execution::run_targets(&config, snapshot.as_deref()),
    };

    if let Err(e) = result {
        match &e {
            Error::SimulationAborted { .. } => {
                eprintln!("\nAborted: {e}");
                process::exit(2);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}

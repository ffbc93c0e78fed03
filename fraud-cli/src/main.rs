//! Fraud Proof CLI
//!
//! Operator tool for the fraud-proof subsystem: list proof kinds, inspect a
//! proof store and run the restart check.

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fraud")]
#[command(version = "0.1.0")]
#[command(about = "Fraud proofs - inspect stores and check for proven fraud", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered proof kinds
    Kinds,

    /// List proofs held in a store
    Proofs(commands::proofs::ProofsArgs),

    /// Fail if a store already holds proven fraud
    Check(commands::check::CheckArgs),
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::error(&e);
            std::process::exit(1);
        }
    };

    let exit_code = match cli.command {
        Commands::Kinds => commands::kinds::run(),
        Commands::Proofs(args) => commands::proofs::run(args, &config),
        Commands::Check(args) => commands::check::run(args, &config),
    };

    std::process::exit(exit_code);
}

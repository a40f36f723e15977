//! Tandem CLI
//!
//! Command-line interface for operating the Tandem blue/green orchestrator.

mod commands;
mod config;
mod id_resolver;
mod output;
mod types;

use std::process::ExitCode;

use clap::Parser;
use colored::*;
use commands::{Commands, exit_code, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Tandem blue/green deployment CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "TANDEM_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    /// Print JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
        json: cli.json,
    };

    match handle_command(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::from(exit_code(&err))
        }
    }
}

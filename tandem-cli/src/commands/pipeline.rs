//! Pipeline command handlers
//!
//! Hooks for a source provider and build system: report new revisions and
//! stage outcomes, and list pipeline runs.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use tandem_core::domain::pipeline::StageOutcome;

use crate::config::Config;
use crate::output::{print_json, print_run};

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Report a new source revision
    Trigger {
        /// Source revision (e.g. a commit id)
        revision: String,
    },
    /// Report the outcome of the active run's current stage
    Advance {
        /// Artifact produced by the build stage
        #[arg(long, conflicts_with = "failed")]
        artifact: Option<String>,

        /// Mark the stage failed with this reason
        #[arg(long)]
        failed: Option<String>,
    },
    /// List pipeline runs
    Runs,
    /// Show the current and queued runs
    Status,
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        PipelineCommands::Trigger { revision } => {
            let run = client.trigger_pipeline(&revision).await?;
            if config.json {
                return print_json(&run);
            }
            match run {
                Some(run) => {
                    println!("{} Pipeline run started for {}", "✓".green(), revision.bold());
                    print_run(&run);
                }
                None => println!(
                    "{}",
                    format!("A run for {} is already in progress.", revision).yellow()
                ),
            }
        }
        PipelineCommands::Advance { artifact, failed } => {
            let run = client.advance_pipeline(stage_outcome(artifact, failed)).await?;
            if config.json {
                return print_json(&run);
            }
            print_run(&run);
        }
        PipelineCommands::Status => {
            let status = client.pipeline_status().await?;
            if config.json {
                return print_json(&status);
            }
            match &status.current {
                Some(run) => {
                    println!("{}", "Current run:".bold());
                    print_run(run);
                }
                None => println!("{}", "No pipeline run in progress.".yellow()),
            }
            if let Some(run) = &status.queued {
                println!("{}", "Queued:".bold());
                print_run(run);
            }
        }
        PipelineCommands::Runs => {
            let runs = client.list_pipeline_runs().await?;
            if config.json {
                return print_json(&runs);
            }
            if runs.is_empty() {
                println!("{}", "No pipeline runs found.".yellow());
            } else {
                println!("{}", format!("Found {} run(s):", runs.len()).bold());
                println!();
                for run in &runs {
                    print_run(run);
                }
            }
        }
    }

    Ok(())
}

fn stage_outcome(artifact: Option<String>, failed: Option<String>) -> StageOutcome {
    match failed {
        Some(reason) => StageOutcome::Failed { reason },
        None => StageOutcome::Succeeded { artifact },
    }
}

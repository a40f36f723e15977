//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deploy;
mod pipeline;
mod topology;

pub use pipeline::PipelineCommands;
pub use topology::TopologyCommands;

use anyhow::Result;
use clap::Subcommand;
use tandem_client::ClientError;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy an artifact to the idle pool
    Deploy {
        /// Artifact reference (e.g. an image URI)
        artifact: String,

        /// Traffic percentages for the new pool (comma-separated)
        #[arg(long, value_delimiter = ',')]
        steps: Vec<u8>,

        /// Seconds to observe after each traffic step
        #[arg(long)]
        evaluation_interval: Option<u64>,

        /// Seconds to keep the old pool before teardown
        #[arg(long)]
        termination_wait: Option<u64>,

        /// Follow the deployment until it finishes
        #[arg(short, long)]
        wait: bool,
    },
    /// Show the live or most recent deployment
    Status {
        /// Deployment ID or unambiguous prefix
        id: Option<String>,
    },
    /// Roll back the live deployment
    Rollback {
        /// Reason recorded in the rollback report
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// List all deployments
    History,
    /// Inspect and steer the blue/green pools
    Topology {
        #[command(subcommand)]
        command: TopologyCommands,
    },
    /// Pipeline hooks
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Deploy {
            artifact,
            steps,
            evaluation_interval,
            termination_wait,
            wait,
        } => {
            let req = tandem_core::dto::deployment::StartDeployment {
                artifact,
                traffic_steps: steps,
                evaluation_interval_secs: evaluation_interval,
                termination_wait_secs: termination_wait,
            };
            deploy::deploy(config, req, wait).await
        }
        Commands::Status { id } => deploy::status(config, id).await,
        Commands::Rollback { reason } => deploy::rollback(config, reason).await,
        Commands::History => deploy::history(config).await,
        Commands::Topology { command } => topology::handle_topology_command(command, config).await,
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
    }
}

/// Process exit status for a failed command
///
/// 2 when another deployment is in flight, 3 when the topology is
/// inconsistent, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ClientError>() {
        Some(e) if e.is_deployment_in_progress() => 2,
        Some(e) if e.is_inconsistent_topology() => 3,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn api_error(kind: &str) -> anyhow::Error {
        let body = format!(r#"{{"error":"rejected","kind":"{}"}}"#, kind);
        anyhow::Error::new(ClientError::api_error(409, body))
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&api_error("deployment_in_progress")), 2);
        assert_eq!(exit_code(&api_error("inconsistent_topology")), 3);
        assert_eq!(exit_code(&api_error("no_active_deployment")), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("deployment rolled back")), 1);
    }

    #[test]
    fn test_exit_code_survives_context() {
        let err: Result<()> = Err(api_error("deployment_in_progress"));
        let err = err.context("Failed to start deployment").unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }
}

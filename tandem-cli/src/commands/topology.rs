//! Topology command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use tandem_core::domain::pool::{HealthStatus, PoolLabel, Weights};

use crate::config::Config;
use crate::output::{print_json, print_topology};

/// Topology subcommands
#[derive(Subcommand)]
pub enum TopologyCommands {
    /// Show both pools
    Show,
    /// Set traffic weights (must sum to 100)
    Weights {
        #[arg(long)]
        blue: u8,
        #[arg(long)]
        green: u8,
    },
    /// Report a pool's health
    Health {
        /// blue or green
        pool: PoolLabel,
        /// healthy, unhealthy or unknown
        status: HealthStatus,
    },
    /// Clear a halt after verifying the load balancer by hand
    Resolve {
        #[arg(long)]
        blue: u8,
        #[arg(long)]
        green: u8,
    },
}

/// Handle topology commands
pub async fn handle_topology_command(command: TopologyCommands, config: &Config) -> Result<()> {
    let client = config.client();

    let snapshot = match command {
        TopologyCommands::Show => client.topology().await?,
        TopologyCommands::Weights { blue, green } => client
            .set_weights(Weights::new(blue, green))
            .await
            .context("Failed to set weights")?,
        TopologyCommands::Health { pool, status } => {
            client.report_health(pool, status).await?
        }
        TopologyCommands::Resolve { blue, green } => {
            let snapshot = client
                .resolve_topology(Weights::new(blue, green))
                .await
                .context("Failed to resolve topology")?;
            if !config.json {
                println!("{} Topology resolved", "✓".green());
            }
            snapshot
        }
    };

    if config.json {
        return print_json(&snapshot);
    }

    print_topology(&snapshot);
    Ok(())
}

//! Deployment command handlers
//!
//! Handles starting, following, inspecting and rolling back deployments.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use tandem_client::OrchestratorClient;
use tandem_core::domain::deployment::{Deployment, DeploymentState};
use tandem_core::dto::deployment::StartDeployment;
use uuid::Uuid;

use crate::config::Config;
use crate::id_resolver::resolve_deployment_id;
use crate::output::{
    colorize_state, print_deployment_details, print_deployment_summary, print_json,
};
use crate::types::IdOrPrefix;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub async fn deploy(config: &Config, req: StartDeployment, wait: bool) -> Result<()> {
    let client = config.client();

    let deployment = client
        .start_deployment(req)
        .await
        .context("Failed to start deployment")?;

    if !wait {
        if config.json {
            return print_json(&deployment);
        }
        println!(
            "{} Deployment {} started: {} -> {} pool",
            "✓".green(),
            deployment.id.to_string().cyan(),
            deployment.artifact.bold(),
            deployment.target_pool
        );
        println!(
            "{}",
            format!("  Follow with `tandem status {}`", deployment.id).dimmed()
        );
        return Ok(());
    }

    let finished = follow(&client, deployment.id, config.json).await?;
    if config.json {
        print_json(&finished)?;
    } else {
        println!();
        print_deployment_details(&finished);
    }

    if finished.state == DeploymentState::RolledBack {
        anyhow::bail!("deployment {} rolled back", finished.id);
    }

    Ok(())
}

/// Polls a deployment until it reaches a terminal state
async fn follow(client: &OrchestratorClient, id: Uuid, quiet: bool) -> Result<Deployment> {
    let mut seen = 0;
    let mut weight = None;

    loop {
        let deployment = client.get_deployment(id).await?;

        if !quiet {
            for t in deployment.transitions.iter().skip(seen) {
                println!(
                    "{} {}",
                    t.at.format("%H:%M:%S").to_string().dimmed(),
                    colorize_state(t.to)
                );
            }
            if weight != Some(deployment.target_weight) && !deployment.is_terminal() {
                println!(
                    "         {} pool at {}%",
                    deployment.target_pool, deployment.target_weight
                );
            }
        }
        seen = deployment.transitions.len();
        weight = Some(deployment.target_weight);

        if deployment.is_terminal() {
            return Ok(deployment);
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub async fn status(config: &Config, id: Option<String>) -> Result<()> {
    let client = config.client();

    let deployment = match id {
        Some(id) => {
            let uuid = resolve_deployment_id(&client, &IdOrPrefix::parse(&id)).await?;
            Some(client.get_deployment(uuid).await?)
        }
        None => client.current_deployment().await?,
    };

    match deployment {
        Some(d) if config.json => print_json(&d),
        Some(d) => {
            print_deployment_details(&d);
            Ok(())
        }
        None if config.json => print_json(&serde_json::Value::Null),
        None => {
            println!("{}", "No deployments yet.".yellow());
            Ok(())
        }
    }
}

pub async fn rollback(config: &Config, reason: Option<String>) -> Result<()> {
    let id = config
        .client()
        .rollback(reason)
        .await
        .context("Failed to request rollback")?;

    println!(
        "{} Rollback requested for deployment {}",
        "✓".green(),
        id.to_string().cyan()
    );

    Ok(())
}

pub async fn history(config: &Config) -> Result<()> {
    let deployments = config.client().list_deployments().await?;

    if config.json {
        return print_json(&deployments);
    }

    if deployments.is_empty() {
        println!("{}", "No deployments found.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} deployment(s):", deployments.len()).bold()
        );
        println!();
        for deployment in &deployments {
            print_deployment_summary(deployment);
        }
    }

    Ok(())
}

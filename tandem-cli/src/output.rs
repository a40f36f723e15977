//! Formatted terminal output shared by the command handlers

use anyhow::Result;
use colored::*;
use serde::Serialize;
use tandem_core::domain::deployment::{Deployment, DeploymentState};
use tandem_core::domain::pipeline::{PipelineRun, RunStatus, StageOutcome};
use tandem_core::domain::pool::{HealthStatus, ServicePool};
use tandem_core::dto::topology::TopologySnapshot;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One line per deployment
pub fn print_deployment_summary(deployment: &Deployment) {
    println!(
        "  {} {} {} -> {} pool  {}  {}",
        "▸".cyan(),
        deployment.id.to_string().dimmed(),
        deployment.artifact.bold(),
        deployment.target_pool,
        colorize_state(deployment.state),
        deployment
            .started_at
            .format(TIME_FORMAT)
            .to_string()
            .dimmed()
    );
}

pub fn print_deployment_details(deployment: &Deployment) {
    println!("{}", "Deployment Details:".bold());
    println!("  ID:          {}", deployment.id.to_string().cyan());
    println!("  Artifact:    {}", deployment.artifact);
    println!("  Target pool: {}", deployment.target_pool);
    println!("  State:       {}", colorize_state(deployment.state));
    println!(
        "  Traffic:     {}% (steps {:?})",
        deployment.target_weight, deployment.traffic_steps
    );
    println!(
        "  Started:     {}",
        deployment.started_at.format(TIME_FORMAT)
    );

    if let Some(finished) = deployment.finished_at {
        println!("  Finished:    {}", finished.format(TIME_FORMAT));
        let seconds = finished
            .signed_duration_since(deployment.started_at)
            .num_seconds();
        println!("  Duration:    {}s", seconds);
    }

    if let Some(report) = &deployment.rollback {
        println!("\n{}", "Rollback:".bold());
        println!("  Cause:   {}", report.kind.to_string().red());
        println!("  Reason:  {}", report.message);
        println!(
            "  Weights: blue={} green={} at {}",
            report.blue_weight,
            report.green_weight,
            report.at.format(TIME_FORMAT)
        );
    }

    if !deployment.transitions.is_empty() {
        println!("\n{}", "Transitions:".bold());
        for t in &deployment.transitions {
            println!(
                "  {} {} -> {}",
                t.at.format("%H:%M:%S").to_string().dimmed(),
                t.from,
                colorize_state(t.to)
            );
        }
    }
}

pub fn print_topology(snapshot: &TopologySnapshot) {
    println!("{}", "Topology:".bold());
    print_pool(&snapshot.blue);
    print_pool(&snapshot.green);
    println!("  Last active: {}", snapshot.last_active);

    if let Some(reason) = &snapshot.halted {
        println!(
            "\n{} {}",
            "⚠ Automated weight changes halted:".yellow().bold(),
            reason
        );
        println!(
            "{}",
            "  Verify the load balancer, then run `tandem topology resolve`".dimmed()
        );
    }
}

fn print_pool(pool: &ServicePool) {
    let marker = if pool.is_active() {
        "●".green()
    } else {
        "○".dimmed()
    };
    println!(
        "  {} {:<5} {:>3}%  {:<9}  {}  {}",
        marker,
        pool.label.to_string(),
        pool.weight,
        colorize_health(pool.health),
        pool.artifact_version.as_deref().unwrap_or("-"),
        pool.target_group.dimmed()
    );
}

pub fn print_run(run: &PipelineRun) {
    println!(
        "  {} {} {:<10} {:<7} {}",
        "▸".cyan(),
        run.id.to_string().dimmed(),
        run.revision.bold(),
        run.stage.to_string(),
        colorize_run_status(run.status)
    );

    for record in &run.outcomes {
        let outcome = match &record.outcome {
            StageOutcome::Succeeded {
                artifact: Some(artifact),
            } => format!("{} {}", "✓".green(), artifact),
            StageOutcome::Succeeded { artifact: None } => "✓".green().to_string(),
            StageOutcome::Failed { reason } => format!("{} {}", "✗".red(), reason),
        };
        println!("      {:<7} {}", record.stage.to_string(), outcome);
    }

    if let Some(id) = run.deployment_id {
        println!("      Deployment: {}", id.to_string().dimmed());
    }
    if let Some(reason) = &run.failure_reason {
        println!("      {}", reason.red());
    }
}

pub fn colorize_state(state: DeploymentState) -> ColoredString {
    let text = state.to_string();
    match state {
        DeploymentState::Completed => text.green(),
        DeploymentState::RolledBack => text.red(),
        DeploymentState::RollingBack => text.yellow(),
        DeploymentState::Pending => text.dimmed(),
        _ => text.cyan(),
    }
}

fn colorize_health(health: HealthStatus) -> ColoredString {
    let text = health.to_string();
    match health {
        HealthStatus::Healthy => text.green(),
        HealthStatus::Unhealthy => text.red(),
        HealthStatus::Unknown => text.dimmed(),
    }
}

fn colorize_run_status(status: RunStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        RunStatus::Succeeded => text.green(),
        RunStatus::Failed => text.red(),
        RunStatus::Superseded => text.dimmed(),
        RunStatus::Queued => text.yellow(),
        RunStatus::InProgress | RunStatus::Deploying => text.cyan(),
    }
}

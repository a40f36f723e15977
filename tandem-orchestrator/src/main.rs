use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tandem_core::domain::pool::{HealthStatus, PoolLabel};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod integrations;
pub mod repository;
pub mod service;
pub mod state;

use config::Config;
use integrations::{
    HealthCheckError, HealthMonitor, HttpHealthMonitor, InMemoryInstaller, InMemoryRouter,
    RegistryHealthMonitor,
};
use repository::TopologyRegistry;
use service::{PipelineSequencer, ReleaseController, ReleaseSettings};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tandem Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Managing {} / {} (blue={}, green={}), {} pool active",
        config.project,
        config.env,
        config.target_group(PoolLabel::Blue),
        config.target_group(PoolLabel::Green),
        config.initial_active
    );

    let registry = Arc::new(TopologyRegistry::new(
        config.initial_active,
        config.target_group(PoolLabel::Blue),
        config.target_group(PoolLabel::Green),
    ));

    let health: Arc<dyn HealthMonitor> = match config.health_urls() {
        Some((blue, green)) => {
            tracing::info!("Probing pool health over HTTP ({}, {})", blue, green);
            let monitor = Arc::new(HttpHealthMonitor::new(blue, green, config.health_timeout)?);
            spawn_health_poller(
                monitor.clone(),
                Arc::clone(&registry),
                config.health_poll_interval,
            );
            monitor
        }
        None => {
            tracing::info!("No health URLs configured, using pushed health reports");
            Arc::new(RegistryHealthMonitor::new(Arc::clone(&registry)))
        }
    };

    let controller = Arc::new(ReleaseController::new(
        Arc::clone(&registry),
        Arc::new(InMemoryRouter::new(registry.weights())),
        health,
        Arc::new(InMemoryInstaller::new()),
        ReleaseSettings::from(&config),
    ));

    let sequencer = Arc::new(PipelineSequencer::new(Arc::clone(&controller)));
    sequencer.spawn_deployment_listener();

    // Build router with all API endpoints
    let app = api::create_router(AppState::new(controller, sequencer));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

/// Keeps registry health current for both pools between deployments
fn spawn_health_poller(
    monitor: Arc<HttpHealthMonitor>,
    registry: Arc<TopologyRegistry>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for pool in PoolLabel::ALL {
                match monitor.check(pool).await {
                    Ok(status) => {
                        if registry.mark_health(pool, status) {
                            tracing::info!("{} pool is now {}", pool, status);
                        }
                    }
                    Err(HealthCheckError::Transient(msg)) => {
                        tracing::debug!("Transient health probe error for {} pool: {}", pool, msg);
                    }
                    Err(e) => {
                        tracing::warn!("Health probe for {} pool failed: {}", pool, e);
                        registry.mark_health(pool, HealthStatus::Unhealthy);
                    }
                }
            }
        }
    });
}

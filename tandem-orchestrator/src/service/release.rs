//! Release Service
//!
//! Drives one deployment at a time through a blue/green cutover:
//!
//! `Pending -> Deploying -> ShiftingTraffic -> Observing -> Completed`
//!
//! Any unhealthy signal for the target pool while traffic is shifting or
//! being observed, and any registry or router failure, diverts the
//! deployment to `RollingBack -> RolledBack`. Waits are cancellable timed
//! polls so a pushed health signal or an operator rollback takes effect
//! immediately.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tandem_core::domain::deployment::{
    Deployment, DeploymentState, RollbackReport, normalize_traffic_steps,
};
use tandem_core::domain::error::ErrorKind;
use tandem_core::domain::pool::{HealthStatus, PoolLabel, Weights};
use tandem_core::dto::deployment::StartDeployment;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::integrations::{ArtifactInstaller, HealthCheckError, HealthMonitor, TrafficRouter};
use crate::repository::{TopologyError, TopologyRegistry};

/// Service error type
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("deployment {0} is already in progress")]
    DeploymentInProgress(Uuid),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("invalid deployment request: {0}")]
    InvalidRequest(String),

    #[error("no deployment in progress")]
    NoActiveDeployment,

    #[error("deployment {0} not found")]
    NotFound(Uuid),

    #[error("router failure: {0}")]
    Router(String),
}

impl ReleaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReleaseError::DeploymentInProgress(_) => ErrorKind::DeploymentInProgress,
            ReleaseError::Topology(e) => e.kind(),
            ReleaseError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ReleaseError::NoActiveDeployment => ErrorKind::NoActiveDeployment,
            ReleaseError::NotFound(_) => ErrorKind::NotFound,
            ReleaseError::Router(_) => ErrorKind::RouterFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Pacing and health check tuning shared by every deployment
#[derive(Debug, Clone)]
pub struct ReleaseSettings {
    pub traffic_steps: Vec<u8>,
    pub evaluation_interval: Duration,
    pub termination_wait: Duration,
    pub health_poll_interval: Duration,
    pub health_retries: u32,
    pub health_retry_delay: Duration,
}

impl From<&crate::config::Config> for ReleaseSettings {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            traffic_steps: config.traffic_steps.clone(),
            evaluation_interval: config.evaluation_interval,
            termination_wait: config.termination_wait,
            health_poll_interval: config.health_poll_interval,
            health_retries: config.health_retries,
            health_retry_delay: config.health_retry_delay,
        }
    }
}

/// Request to roll an artifact onto the idle pool
///
/// Unset fields fall back to [`ReleaseSettings`].
#[derive(Debug, Clone, Default)]
pub struct ReleaseRequest {
    pub artifact: String,
    pub traffic_steps: Vec<u8>,
    pub evaluation_interval: Option<Duration>,
    pub termination_wait: Option<Duration>,
}

impl ReleaseRequest {
    pub fn for_artifact(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            ..Self::default()
        }
    }
}

impl From<StartDeployment> for ReleaseRequest {
    fn from(req: StartDeployment) -> Self {
        Self {
            artifact: req.artifact,
            traffic_steps: req.traffic_steps,
            evaluation_interval: req.evaluation_interval_secs.map(Duration::from_secs),
            termination_wait: req.termination_wait_secs.map(Duration::from_secs),
        }
    }
}

/// Why a deployment is being rolled back
#[derive(Debug, Clone)]
struct RollbackCause {
    kind: ErrorKind,
    message: String,
}

impl RollbackCause {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ReleaseError> for RollbackCause {
    fn from(err: ReleaseError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

type CutoverResult = std::result::Result<(), RollbackCause>;

/// The deployment slot: at most one non-terminal deployment
#[derive(Default)]
struct Slot {
    active: Option<Uuid>,
    abort: Option<watch::Sender<Option<String>>>,
}

pub struct ReleaseController {
    registry: Arc<TopologyRegistry>,
    router: Arc<dyn TrafficRouter>,
    health: Arc<dyn HealthMonitor>,
    installer: Arc<dyn ArtifactInstaller>,
    settings: ReleaseSettings,
    slot: Mutex<Slot>,
    history: RwLock<Vec<Deployment>>,
    updates: watch::Sender<Option<Deployment>>,
}

impl ReleaseController {
    pub fn new(
        registry: Arc<TopologyRegistry>,
        router: Arc<dyn TrafficRouter>,
        health: Arc<dyn HealthMonitor>,
        installer: Arc<dyn ArtifactInstaller>,
        settings: ReleaseSettings,
    ) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            registry,
            router,
            health,
            installer,
            settings,
            slot: Mutex::new(Slot::default()),
            history: RwLock::new(Vec::new()),
            updates,
        }
    }

    /// Starts a deployment onto the idle pool
    ///
    /// Claims the deployment slot, spawns the cutover task and returns the
    /// `Pending` snapshot. Fails with `DeploymentInProgress` while another
    /// deployment is live, and with `InconsistentTopology` unless one pool
    /// holds full weight.
    pub fn start(self: &Arc<Self>, req: ReleaseRequest) -> Result<Deployment> {
        let artifact = req.artifact.trim().to_string();
        if artifact.is_empty() {
            return Err(ReleaseError::InvalidRequest(
                "artifact reference cannot be empty".to_string(),
            ));
        }

        let steps = if req.traffic_steps.is_empty() {
            self.settings.traffic_steps.clone()
        } else {
            req.traffic_steps
        };
        let steps = normalize_traffic_steps(&steps).map_err(ReleaseError::InvalidRequest)?;

        let mut slot = self.lock_slot();
        if let Some(id) = slot.active {
            return Err(ReleaseError::DeploymentInProgress(id));
        }

        let active = self.registry.get_active()?;
        if !active.is_active() {
            return Err(TopologyError::InconsistentTopology(format!(
                "no pool holds full weight ({})",
                self.registry.weights()
            ))
            .into());
        }

        let idle = self.registry.get_idle()?;
        let deployment = Deployment::new(
            artifact,
            idle.label,
            steps,
            req.evaluation_interval
                .unwrap_or(self.settings.evaluation_interval),
            req.termination_wait.unwrap_or(self.settings.termination_wait),
        );

        let (abort_tx, abort_rx) = watch::channel(None);
        slot.active = Some(deployment.id);
        slot.abort = Some(abort_tx);
        self.record(&deployment);
        drop(slot);

        tracing::info!(
            "Deployment {} created: {} -> {} pool (steps {:?})",
            deployment.id,
            deployment.artifact,
            deployment.target_pool,
            deployment.traffic_steps
        );
        self.updates.send_replace(Some(deployment.clone()));

        let controller = Arc::clone(self);
        let run = deployment.clone();
        tokio::spawn(async move {
            controller.drive(run, abort_rx).await;
        });

        Ok(deployment)
    }

    /// Operator override: forces the live deployment to roll back
    pub fn rollback(&self, reason: Option<String>) -> Result<Uuid> {
        let slot = self.lock_slot();
        match (slot.active, &slot.abort) {
            (Some(id), Some(abort)) => {
                let reason = reason.unwrap_or_else(|| "rollback requested by operator".to_string());
                tracing::warn!("Operator rollback requested for {}: {}", id, reason);
                abort.send_replace(Some(reason));
                Ok(id)
            }
            _ => Err(ReleaseError::NoActiveDeployment),
        }
    }

    /// Live deployment, or the most recent one when nothing is in flight
    pub fn current(&self) -> Option<Deployment> {
        self.updates.borrow().clone()
    }

    /// Id of the deployment holding the slot
    pub fn active_id(&self) -> Option<Uuid> {
        self.lock_slot().active
    }

    pub fn get(&self, id: Uuid) -> Result<Deployment> {
        self.read_history()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(ReleaseError::NotFound(id))
    }

    /// All deployments, oldest first
    pub fn list(&self) -> Vec<Deployment> {
        self.read_history().clone()
    }

    /// Receiver that sees every deployment state change
    pub fn subscribe(&self) -> watch::Receiver<Option<Deployment>> {
        self.updates.subscribe()
    }

    pub fn registry(&self) -> &Arc<TopologyRegistry> {
        &self.registry
    }

    /// Operator weight change, applied through the router
    ///
    /// Refused while a deployment holds the slot.
    pub async fn set_weights(&self, weights: Weights) -> Result<Weights> {
        if let Some(id) = self.active_id() {
            return Err(ReleaseError::DeploymentInProgress(id));
        }

        self.apply_weights(weights).await?;
        tracing::info!("Operator set weights to {}", weights);
        Ok(weights)
    }

    /// Clears a halted registry once the router confirms `weights` are in effect
    pub async fn resolve(&self, weights: Weights) -> Result<Weights> {
        if let Some(id) = self.active_id() {
            return Err(ReleaseError::DeploymentInProgress(id));
        }
        TopologyRegistry::validate_weights(weights)?;

        let effective = self
            .router
            .current()
            .await
            .map_err(|e| ReleaseError::Router(e.to_string()))?;
        if effective != weights {
            return Err(TopologyError::InconsistentTopology(format!(
                "router reports {}, not {}",
                effective, weights
            ))
            .into());
        }

        self.registry.resolve(weights)?;
        tracing::info!("Topology resolved at {}", weights);
        Ok(weights)
    }

    // =============================================================================
    // Cutover
    // =============================================================================

    async fn drive(self: Arc<Self>, mut deployment: Deployment, mut abort: watch::Receiver<Option<String>>) {
        let outcome = self.cutover(&mut deployment, &mut abort).await;

        let final_state = match outcome {
            Ok(()) => DeploymentState::Completed,
            Err(cause) => {
                self.roll_back(&mut deployment, cause).await;
                DeploymentState::RolledBack
            }
        };

        self.finish(&mut deployment, final_state);
    }

    async fn cutover(
        &self,
        deployment: &mut Deployment,
        abort: &mut watch::Receiver<Option<String>>,
    ) -> CutoverResult {
        let target = deployment.target_pool;
        let previous = target.other();

        self.advance(deployment, DeploymentState::Deploying);
        self.installer
            .install(target, &deployment.artifact)
            .await
            .map_err(|e| RollbackCause::new(ErrorKind::InstallFailure, e.to_string()))?;
        self.registry.set_artifact(target, &deployment.artifact);
        self.registry.mark_health(target, HealthStatus::Unknown);
        Self::check_abort(abort)?;

        self.advance(deployment, DeploymentState::ShiftingTraffic);
        let steps = deployment.traffic_steps.clone();
        for step in steps {
            Self::check_abort(abort)?;
            self.shift_to(deployment, step).await?;
            if step == 100 {
                break;
            }
            self.observe(deployment, deployment.evaluation_interval, abort)
                .await?;
        }

        self.advance(deployment, DeploymentState::Observing);
        self.observe(deployment, deployment.termination_wait, abort)
            .await?;

        if let Err(e) = self.installer.teardown(previous).await {
            tracing::error!(
                "Deployment {}: teardown of {} pool failed: {}",
                deployment.id,
                previous,
                e
            );
        }
        self.registry.clear_artifact(previous);
        self.registry.mark_health(previous, HealthStatus::Unknown);

        Ok(())
    }

    /// Raises the target pool to `weight`
    ///
    /// Refuses when the target was last seen unhealthy, so an unhealthy
    /// version never gains traffic.
    async fn shift_to(&self, deployment: &mut Deployment, weight: u8) -> CutoverResult {
        let target = deployment.target_pool;
        if self.registry.pool(target).health == HealthStatus::Unhealthy {
            return Err(RollbackCause::new(
                ErrorKind::HealthCheckFailure,
                format!("{} pool is unhealthy at weight {}", target, deployment.target_weight),
            ));
        }

        self.apply_weights(Weights::routing(target, weight)).await?;
        deployment.target_weight = weight;
        tracing::info!(
            "Deployment {}: {} pool now at {}%",
            deployment.id,
            target,
            weight
        );
        self.publish(deployment);
        Ok(())
    }

    /// Validates, applies and verifies a weight change, then records it
    async fn apply_weights(&self, weights: Weights) -> Result<()> {
        TopologyRegistry::validate_weights(weights)?;
        self.registry.check_consistent()?;

        let effective = self
            .router
            .apply(weights)
            .await
            .map_err(|e| ReleaseError::Router(e.to_string()))?;

        if effective != weights {
            let reason = format!(
                "router reports {} after requesting {}",
                effective, weights
            );
            self.registry.halt(reason.clone());
            return Err(TopologyError::InconsistentTopology(reason).into());
        }

        self.registry.set_weights(weights)?;
        Ok(())
    }

    /// Polls target health for `duration`
    ///
    /// Returns early with a rollback cause on an unhealthy result, a pushed
    /// unhealthy signal or an operator abort.
    async fn observe(
        &self,
        deployment: &Deployment,
        duration: Duration,
        abort: &mut watch::Receiver<Option<String>>,
    ) -> CutoverResult {
        let target = deployment.target_pool;
        let deadline = Instant::now() + duration;
        let mut health_rx = self.registry.subscribe_health();

        loop {
            self.check_health(target, deployment.target_weight).await?;
            let _ = health_rx.borrow_and_update();

            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let pause = self.settings.health_poll_interval.min(deadline - now);

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = abort.changed() => {
                    if changed.is_err() {
                        tokio::time::sleep(pause).await;
                    }
                    Self::check_abort(abort)?;
                }
                changed = health_rx.changed() => {
                    if changed.is_ok() {
                        let change = *health_rx.borrow_and_update();
                        if let Some(change) = change {
                            if change.pool == target && change.status == HealthStatus::Unhealthy {
                                return Err(RollbackCause::new(
                                    ErrorKind::HealthCheckFailure,
                                    format!(
                                        "{} pool reported unhealthy at weight {}",
                                        target, deployment.target_weight
                                    ),
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    /// One health check with bounded retries for transient errors
    async fn check_health(&self, target: PoolLabel, weight: u8) -> CutoverResult {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.health.check(target).await {
                Ok(status) => {
                    self.registry.mark_health(target, status);
                    if status == HealthStatus::Unhealthy {
                        return Err(RollbackCause::new(
                            ErrorKind::HealthCheckFailure,
                            format!("{} pool unhealthy at weight {}", target, weight),
                        ));
                    }
                    return Ok(());
                }
                Err(HealthCheckError::Transient(msg)) if attempt <= self.settings.health_retries => {
                    tracing::warn!(
                        "Health check of {} pool failed (attempt {}/{}): {}",
                        target,
                        attempt,
                        self.settings.health_retries + 1,
                        msg
                    );
                    tokio::time::sleep(self.settings.health_retry_delay).await;
                }
                Err(e) => {
                    self.registry.mark_health(target, HealthStatus::Unhealthy);
                    return Err(RollbackCause::new(
                        ErrorKind::HealthCheckFailure,
                        format!(
                            "{} pool health check failed after {} attempt(s) at weight {}: {}",
                            target, attempt, weight, e
                        ),
                    ));
                }
            }
        }
    }

    fn check_abort(abort: &watch::Receiver<Option<String>>) -> CutoverResult {
        match abort.borrow().as_ref() {
            Some(reason) => Err(RollbackCause::new(ErrorKind::OperatorOverride, reason.clone())),
            None => Ok(()),
        }
    }

    // =============================================================================
    // Rollback
    // =============================================================================

    /// Restores full weight to the previous pool and records the report
    async fn roll_back(&self, deployment: &mut Deployment, cause: RollbackCause) {
        let weights = self.registry.weights();
        deployment.rollback = Some(RollbackReport {
            kind: cause.kind,
            message: cause.message.clone(),
            blue_weight: weights.blue,
            green_weight: weights.green,
            at: Utc::now(),
        });
        tracing::warn!(
            "Deployment {} rolling back ({}: {}) at {}",
            deployment.id,
            cause.kind,
            cause.message,
            weights
        );
        self.advance(deployment, DeploymentState::RollingBack);

        let target = deployment.target_pool;
        let previous = target.other();
        let mut restored = true;
        if self.registry.check_consistent().is_err() {
            let (applied, note) = self.restore_while_halted(deployment.id, Weights::routing(previous, 100)).await;
            if applied {
                deployment.target_weight = 0;
            }
            restored = applied;
            if let Some(report) = deployment.rollback.as_mut() {
                report.message = format!("{}; {}", report.message, note);
            }
            self.publish(deployment);
        } else if weights.of(target) > 0 {
            match self.apply_weights(Weights::routing(previous, 100)).await {
                Ok(()) => deployment.target_weight = 0,
                Err(e) => {
                    tracing::error!(
                        "Deployment {}: failed to restore {} pool ({}: {}); operator action required",
                        deployment.id,
                        previous,
                        e.kind(),
                        e
                    );
                    restored = false;
                    if let Some(report) = deployment.rollback.as_mut() {
                        report.message = format!("{}; restore not applied: {}", report.message, e);
                    }
                    self.publish(deployment);
                }
            }
        }

        if restored && deployment.target_weight == 0 {
            if let Err(e) = self.installer.teardown(target).await {
                tracing::error!("Deployment {}: teardown of {} pool failed: {}", deployment.id, target, e);
            }
            self.registry.clear_artifact(target);
        }
    }

    /// Pushes the restore through the router while the registry is halted
    ///
    /// Moving all traffic back to the previous pool is always safe, so it
    /// skips the halt check. The registry stays halted until an operator
    /// resolves it. Returns whether the router confirmed the restore and a
    /// note for the rollback report.
    async fn restore_while_halted(&self, id: Uuid, restore: Weights) -> (bool, String) {
        match self.router.apply(restore).await {
            Ok(effective) if effective == restore => {
                tracing::warn!(
                    "Deployment {}: router restored {} while topology is halted",
                    id,
                    restore
                );
                (true, format!("router restored {}; topology stays halted until resolved", restore))
            }
            Ok(effective) => {
                tracing::error!(
                    "Deployment {}: restore to {} not applied, router reports {}; operator action required",
                    id,
                    restore,
                    effective
                );
                (false, format!("restore not applied: router reports {} after requesting {}", effective, restore))
            }
            Err(e) => {
                tracing::error!(
                    "Deployment {}: restore to {} not applied ({}); operator action required",
                    id,
                    restore,
                    e
                );
                (false, format!("restore not applied: {}", e))
            }
        }
    }

    // =============================================================================
    // State bookkeeping
    // =============================================================================

    fn advance(&self, deployment: &mut Deployment, state: DeploymentState) {
        let from = deployment.state;
        deployment.transition(state);
        tracing::info!("Deployment {}: {} -> {}", deployment.id, from, state);
        self.publish(deployment);
    }

    /// Enters the terminal state and frees the slot in one step
    fn finish(&self, deployment: &mut Deployment, state: DeploymentState) {
        let from = deployment.state;
        {
            let mut slot = self.lock_slot();
            deployment.transition(state);
            self.record(deployment);
            if slot.active == Some(deployment.id) {
                slot.active = None;
                slot.abort = None;
            }
        }
        tracing::info!("Deployment {}: {} -> {}", deployment.id, from, state);
        self.updates.send_replace(Some(deployment.clone()));
    }

    fn publish(&self, deployment: &Deployment) {
        self.record(deployment);
        self.updates.send_replace(Some(deployment.clone()));
    }

    fn record(&self, deployment: &Deployment) {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        match history.iter_mut().find(|d| d.id == deployment.id) {
            Some(existing) => *existing = deployment.clone(),
            None => history.push(deployment.clone()),
        }
    }

    fn read_history(&self) -> std::sync::RwLockReadGuard<'_, Vec<Deployment>> {
        self.history.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Pipeline Service
//!
//! Sequences source changes through Source -> Build -> Deploy and hands
//! successful builds to the release controller. At most one run is in the
//! source/build stages, one is deploying and one is queued behind it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tandem_core::domain::deployment::{Deployment, DeploymentState};
use tandem_core::domain::error::ErrorKind;
use tandem_core::domain::pipeline::{PipelineRun, PipelineStage, RunStatus, StageOutcome};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::service::release::{ReleaseController, ReleaseError, ReleaseRequest};

/// Service error type
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("no pipeline run is in progress")]
    NoActiveRun,

    #[error("invalid pipeline request: {0}")]
    InvalidRequest(String),
}

impl SequencerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SequencerError::NoActiveRun => ErrorKind::NoActiveRun,
            SequencerError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

pub type Result<T> = std::result::Result<T, SequencerError>;

#[derive(Default)]
struct SequencerState {
    /// Run in the source or build stage
    active: Option<PipelineRun>,
    /// Built run waiting for the deployment slot
    queued: Option<PipelineRun>,
    /// Run whose deployment is in flight
    deploying: Option<PipelineRun>,
    /// Finished runs, oldest first
    history: Vec<PipelineRun>,
}

pub struct PipelineSequencer {
    controller: Arc<ReleaseController>,
    state: Mutex<SequencerState>,
}

impl PipelineSequencer {
    pub fn new(controller: Arc<ReleaseController>) -> Self {
        Self {
            controller,
            state: Mutex::new(SequencerState::default()),
        }
    }

    /// Starts a run for a new source revision
    ///
    /// Returns `None` when a run for the same revision is already in
    /// progress, whether building, queued or deploying. A run for a
    /// different revision replaces the one in the source/build stages.
    pub fn on_source_change(&self, revision: &str) -> Result<Option<PipelineRun>> {
        let revision = revision.trim();
        if revision.is_empty() {
            return Err(SequencerError::InvalidRequest(
                "revision cannot be empty".to_string(),
            ));
        }

        let mut state = self.lock_state();
        self.settle(&mut state);

        let live = state
            .active
            .iter()
            .chain(state.queued.iter())
            .chain(state.deploying.iter())
            .find(|r| r.revision == revision);
        if let Some(run) = live {
            tracing::info!(
                "Ignoring source change: run {} ({}) already has revision {}",
                run.id,
                run.status,
                revision
            );
            return Ok(None);
        }

        if let Some(mut superseded) = state.active.take() {
            superseded.finish(
                RunStatus::Superseded,
                Some(format!("superseded by revision {}", revision)),
            );
            tracing::info!(
                "Pipeline run {} ({}) superseded by revision {}",
                superseded.id,
                superseded.revision,
                revision
            );
            state.history.push(superseded);
        }

        let run = PipelineRun::new(revision.to_string());
        tracing::info!("Pipeline run {} created for revision {}", run.id, revision);
        state.active = Some(run.clone());

        Ok(Some(run))
    }

    /// Applies the outcome of the active run's current stage
    pub fn advance(&self, outcome: StageOutcome) -> Result<PipelineRun> {
        let mut state = self.lock_state();
        let mut run = state.active.take().ok_or(SequencerError::NoActiveRun)?;

        let stage = run.stage;
        let Some(next) = stage.next() else {
            state.active = Some(run);
            return Err(SequencerError::InvalidRequest(
                "run is already deploying".to_string(),
            ));
        };
        run.record(outcome.clone());

        let artifact = match outcome {
            StageOutcome::Failed { reason } => {
                tracing::warn!("Pipeline run {} failed in {} stage: {}", run.id, stage, reason);
                run.finish(RunStatus::Failed, Some(reason));
                state.history.push(run.clone());
                return Ok(run);
            }
            StageOutcome::Succeeded { artifact } => artifact,
        };

        if next != PipelineStage::Deploy {
            run.stage = next;
            tracing::info!("Pipeline run {}: {} -> {}", run.id, stage, next);
            state.active = Some(run.clone());
            return Ok(run);
        }

        let artifact = artifact
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        let Some(artifact) = artifact else {
            tracing::warn!("Pipeline run {}: build produced no artifact", run.id);
            run.finish(
                RunStatus::Failed,
                Some("build succeeded without an artifact reference".to_string()),
            );
            state.history.push(run.clone());
            return Ok(run);
        };

        run.artifact = Some(artifact);
        run.stage = next;
        tracing::info!("Pipeline run {}: {} -> {}", run.id, stage, next);

        // A fresher build always wins over one still waiting for the slot
        self.settle(&mut state);
        if let Some(mut older) = state.queued.take() {
            older.finish(
                RunStatus::Superseded,
                Some(format!("superseded by run {}", run.id)),
            );
            tracing::info!("Queued pipeline run {} superseded by {}", older.id, run.id);
            state.history.push(older);
        }
        Ok(self.hand_off(&mut state, run))
    }

    /// Closes the run that owns a finished deployment and starts the queued run
    pub fn on_deployment_finished(&self, deployment: &Deployment) -> Option<PipelineRun> {
        let mut state = self.lock_state();
        let closed = self.close_run(&mut state, deployment);
        self.start_queued(&mut state);
        closed
    }

    /// Brings the sequencer in line with the controller's current state
    pub fn reconcile(&self) {
        let mut state = self.lock_state();
        self.settle(&mut state);
        self.start_queued(&mut state);
    }

    /// Feeds controller updates into [`PipelineSequencer::reconcile`]
    pub fn spawn_deployment_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let sequencer = Arc::clone(self);
        let mut updates = self.controller.subscribe();

        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                sequencer.reconcile();
            }
            tracing::debug!("Deployment listener stopped");
        })
    }

    /// Run in the source/build stages, or else the deploying run
    pub fn current(&self) -> Option<PipelineRun> {
        let state = self.lock_state();
        state.active.clone().or_else(|| state.deploying.clone())
    }

    pub fn queued(&self) -> Option<PipelineRun> {
        self.lock_state().queued.clone()
    }

    /// All runs, oldest first
    pub fn list(&self) -> Vec<PipelineRun> {
        let state = self.lock_state();
        let mut runs: Vec<PipelineRun> = state
            .history
            .iter()
            .chain(state.deploying.iter())
            .chain(state.queued.iter())
            .chain(state.active.iter())
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.created_at);
        runs
    }

    // =============================================================================
    // Internals
    // =============================================================================

    /// Starts a deployment for `run`, or parks it in the empty queue
    fn hand_off(&self, state: &mut SequencerState, mut run: PipelineRun) -> PipelineRun {
        let artifact = run.artifact.clone().unwrap_or_default();

        match self.controller.start(ReleaseRequest::for_artifact(artifact)) {
            Ok(deployment) => {
                run.deployment_id = Some(deployment.id);
                run.set_status(RunStatus::Deploying);
                tracing::info!(
                    "Pipeline run {} handed off as deployment {}",
                    run.id,
                    deployment.id
                );
                state.deploying = Some(run.clone());
            }
            Err(ReleaseError::DeploymentInProgress(live)) => {
                run.set_status(RunStatus::Queued);
                tracing::info!(
                    "Pipeline run {} queued behind deployment {}",
                    run.id,
                    live
                );
                state.queued = Some(run.clone());
            }
            Err(e) => {
                tracing::warn!("Pipeline run {} could not start a deployment: {}", run.id, e);
                run.record(StageOutcome::Failed {
                    reason: e.to_string(),
                });
                run.finish(RunStatus::Failed, Some(e.to_string()));
                state.history.push(run.clone());
            }
        }

        run
    }

    /// Closes the deploying run if its deployment already finished
    fn settle(&self, state: &mut SequencerState) {
        let Some(id) = state.deploying.as_ref().and_then(|r| r.deployment_id) else {
            return;
        };

        match self.controller.get(id) {
            Ok(deployment) if deployment.is_terminal() => {
                self.close_run(state, &deployment);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Deploying pipeline run lost its deployment: {}", e);
                if let Some(mut run) = state.deploying.take() {
                    run.record(StageOutcome::Failed {
                        reason: e.to_string(),
                    });
                    run.finish(RunStatus::Failed, Some(e.to_string()));
                    state.history.push(run);
                }
            }
        }
    }

    fn close_run(&self, state: &mut SequencerState, deployment: &Deployment) -> Option<PipelineRun> {
        let owns = state
            .deploying
            .as_ref()
            .is_some_and(|r| r.deployment_id == Some(deployment.id));
        if !owns || !deployment.is_terminal() {
            return None;
        }

        let mut run = state.deploying.take()?;
        match deployment.state {
            DeploymentState::Completed => {
                run.record(StageOutcome::Succeeded {
                    artifact: Some(deployment.artifact.clone()),
                });
                run.finish(RunStatus::Succeeded, None);
            }
            _ => {
                let reason = deployment
                    .rollback
                    .as_ref()
                    .map(|r| format!("deployment rolled back ({}): {}", r.kind, r.message))
                    .unwrap_or_else(|| "deployment rolled back".to_string());
                run.record(StageOutcome::Failed {
                    reason: reason.clone(),
                });
                run.finish(RunStatus::Failed, Some(reason));
            }
        }
        tracing::info!(
            "Pipeline run {} finished: {} (deployment {} {})",
            run.id,
            run.status,
            deployment.id,
            deployment.state
        );
        state.history.push(run.clone());

        Some(run)
    }

    fn start_queued(&self, state: &mut SequencerState) {
        if state.deploying.is_some() || self.controller.active_id().is_some() {
            return;
        }

        if let Some(run) = state.queued.take() {
            tracing::info!("Starting queued pipeline run {}", run.id);
            self.hand_off(state, run);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SequencerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{InMemoryInstaller, InMemoryRouter, RegistryHealthMonitor};
    use crate::repository::TopologyRegistry;
    use crate::service::release::ReleaseSettings;
    use std::time::Duration;
    use tandem_core::domain::pool::{PoolLabel, Weights};

    fn controller(evaluation_interval: Duration) -> Arc<ReleaseController> {
        let registry = Arc::new(TopologyRegistry::new(
            PoolLabel::Blue,
            "app-test-blueTG".to_string(),
            "app-test-greenTG".to_string(),
        ));
        let settings = ReleaseSettings {
            traffic_steps: vec![10, 50, 100],
            evaluation_interval,
            termination_wait: Duration::from_millis(10),
            health_poll_interval: Duration::from_millis(5),
            health_retries: 1,
            health_retry_delay: Duration::from_millis(1),
        };
        Arc::new(ReleaseController::new(
            Arc::clone(&registry),
            Arc::new(InMemoryRouter::new(registry.weights())),
            Arc::new(RegistryHealthMonitor::new(registry)),
            Arc::new(InMemoryInstaller::new()),
            settings,
        ))
    }

    fn built(artifact: &str) -> StageOutcome {
        StageOutcome::Succeeded {
            artifact: Some(artifact.to_string()),
        }
    }

    fn source_ok() -> StageOutcome {
        StageOutcome::Succeeded { artifact: None }
    }

    /// Pushes a revision through source and build
    fn build_revision(sequencer: &PipelineSequencer, revision: &str, artifact: &str) -> PipelineRun {
        sequencer.on_source_change(revision).unwrap().unwrap();
        sequencer.advance(source_ok()).unwrap();
        sequencer.advance(built(artifact)).unwrap()
    }

    async fn wait_until<F>(what: &str, cond: F)
    where
        F: Fn() -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
    }

    fn status_of(sequencer: &PipelineSequencer, id: uuid::Uuid) -> RunStatus {
        sequencer
            .list()
            .into_iter()
            .find(|r| r.id == id)
            .map(|r| r.status)
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_run_deploys_artifact() {
        let controller = controller(Duration::from_millis(10));
        let sequencer = PipelineSequencer::new(Arc::clone(&controller));

        let run = sequencer.on_source_change("abc123").unwrap().unwrap();
        assert_eq!(run.stage, PipelineStage::Source);

        let run = sequencer.advance(source_ok()).unwrap();
        assert_eq!(run.stage, PipelineStage::Build);
        assert_eq!(run.status, RunStatus::InProgress);

        let run = sequencer.advance(built("app:v2")).unwrap();
        assert_eq!(run.stage, PipelineStage::Deploy);
        assert_eq!(run.status, RunStatus::Deploying);
        assert_eq!(run.artifact.as_deref(), Some("app:v2"));
        let deployment_id = run.deployment_id.unwrap();

        wait_until("deployment to finish", || {
            controller.get(deployment_id).is_ok_and(|d| d.is_terminal())
        })
        .await;

        let deployment = controller.get(deployment_id).unwrap();
        let closed = sequencer.on_deployment_finished(&deployment).unwrap();
        assert_eq!(closed.status, RunStatus::Succeeded);
        let stages: Vec<PipelineStage> = closed.outcomes.iter().map(|o| o.stage).collect();
        assert_eq!(
            stages,
            vec![PipelineStage::Source, PipelineStage::Build, PipelineStage::Deploy]
        );
        assert!(matches!(
            closed.outcomes.last().map(|o| &o.outcome),
            Some(StageOutcome::Succeeded { artifact: Some(a) }) if a == "app:v2"
        ));
        assert!(sequencer.current().is_none());
        assert_eq!(controller.registry().weights(), Weights::new(0, 100));
    }

    #[tokio::test]
    async fn test_failed_stage_never_deploys() {
        let controller = controller(Duration::from_millis(10));
        let sequencer = PipelineSequencer::new(Arc::clone(&controller));

        sequencer.on_source_change("abc123").unwrap();
        sequencer.advance(source_ok()).unwrap();
        let run = sequencer
            .advance(StageOutcome::Failed {
                reason: "unit tests failed".to_string(),
            })
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.stage, PipelineStage::Build);
        assert_eq!(run.failure_reason.as_deref(), Some("unit tests failed"));
        assert!(controller.list().is_empty());
        assert!(matches!(
            sequencer.advance(source_ok()),
            Err(SequencerError::NoActiveRun)
        ));
    }

    #[tokio::test]
    async fn test_build_without_artifact_fails_run() {
        let controller = controller(Duration::from_millis(10));
        let sequencer = PipelineSequencer::new(Arc::clone(&controller));

        sequencer.on_source_change("abc123").unwrap();
        sequencer.advance(source_ok()).unwrap();
        let run = sequencer.advance(source_ok()).unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(controller.list().is_empty());
    }

    #[tokio::test]
    async fn test_advance_without_run() {
        let sequencer = PipelineSequencer::new(controller(Duration::from_millis(10)));
        let err = sequencer.advance(source_ok()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveRun);
    }

    #[tokio::test]
    async fn test_source_change_dedup_and_supersede() {
        let sequencer = PipelineSequencer::new(controller(Duration::from_millis(10)));

        let first = sequencer.on_source_change("abc123").unwrap().unwrap();
        assert!(sequencer.on_source_change("abc123").unwrap().is_none());

        let second = sequencer.on_source_change("def456").unwrap().unwrap();
        assert_eq!(status_of(&sequencer, first.id), RunStatus::Superseded);
        assert_eq!(sequencer.current().map(|r| r.id), Some(second.id));
        assert_eq!(sequencer.list().len(), 2);

        assert!(matches!(
            sequencer.on_source_change(" "),
            Err(SequencerError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_source_change_ignored_while_revision_deploys_or_queues() {
        let controller = controller(Duration::from_secs(30));
        let sequencer = PipelineSequencer::new(Arc::clone(&controller));

        let first = build_revision(&sequencer, "rev1", "app:v1");
        assert_eq!(first.status, RunStatus::Deploying);
        assert!(sequencer.on_source_change("rev1").unwrap().is_none());

        let second = build_revision(&sequencer, "rev2", "app:v2");
        assert_eq!(second.status, RunStatus::Queued);
        assert!(sequencer.on_source_change("rev2").unwrap().is_none());

        assert_eq!(controller.list().len(), 1);
        assert_eq!(sequencer.list().len(), 2);
        assert!(sequencer.on_source_change("rev3").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fresh_build_supersedes_stale_queue_after_slot_frees() {
        let controller = controller(Duration::from_millis(10));
        let sequencer = PipelineSequencer::new(Arc::clone(&controller));

        let first = build_revision(&sequencer, "rev1", "app:v1");
        let second = build_revision(&sequencer, "rev2", "app:v2");
        assert_eq!(second.status, RunStatus::Queued);

        let first_deployment = first.deployment_id.unwrap();
        wait_until("first deployment to finish", || {
            controller.get(first_deployment).is_ok_and(|d| d.is_terminal())
        })
        .await;

        // No listener: the slot is free but the queue was never drained
        let third = build_revision(&sequencer, "rev3", "app:v3");
        assert_eq!(third.status, RunStatus::Deploying);
        assert_eq!(status_of(&sequencer, first.id), RunStatus::Succeeded);
        assert_eq!(status_of(&sequencer, second.id), RunStatus::Superseded);
        assert!(sequencer.queued().is_none());

        let third_deployment = third.deployment_id.unwrap();
        wait_until("third deployment to finish", || {
            controller.get(third_deployment).is_ok_and(|d| d.is_terminal())
        })
        .await;
        sequencer.reconcile();

        let artifacts: Vec<String> = controller.list().into_iter().map(|d| d.artifact).collect();
        assert_eq!(artifacts, vec!["app:v1".to_string(), "app:v3".to_string()]);
        assert_eq!(status_of(&sequencer, third.id), RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_busy_slot_queues_latest_run() {
        let controller = controller(Duration::from_secs(30));
        let sequencer = Arc::new(PipelineSequencer::new(Arc::clone(&controller)));
        let listener = sequencer.spawn_deployment_listener();

        let first = build_revision(&sequencer, "rev1", "app:v1");
        assert_eq!(first.status, RunStatus::Deploying);

        let second = build_revision(&sequencer, "rev2", "app:v2");
        assert_eq!(second.status, RunStatus::Queued);

        let third = build_revision(&sequencer, "rev3", "app:v3");
        assert_eq!(third.status, RunStatus::Queued);
        assert_eq!(status_of(&sequencer, second.id), RunStatus::Superseded);
        assert_eq!(sequencer.queued().map(|r| r.id), Some(third.id));
        assert_eq!(controller.list().len(), 1);

        controller.rollback(None).unwrap();
        wait_until("queued run to deploy", || {
            status_of(&sequencer, third.id) == RunStatus::Deploying
        })
        .await;
        assert_eq!(status_of(&sequencer, first.id), RunStatus::Failed);
        assert!(sequencer.queued().is_none());

        controller.rollback(None).unwrap();
        wait_until("queued run to finish", || {
            status_of(&sequencer, third.id) == RunStatus::Failed
        })
        .await;

        listener.abort();
    }
}

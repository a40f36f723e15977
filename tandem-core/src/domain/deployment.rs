//! Deployment domain types
//!
//! A deployment is one attempt to roll a new artifact onto the idle pool and
//! shift production traffic to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::error::ErrorKind;
use crate::domain::pool::PoolLabel;

/// Traffic steps used when a request does not specify any
pub const DEFAULT_TRAFFIC_STEPS: [u8; 3] = [10, 50, 100];

/// Deployment record
///
/// Owned and mutated by the release controller; clients only read snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub artifact: String,
    pub target_pool: PoolLabel,
    pub state: DeploymentState,

    /// Weight steps the target pool moves through, ending at 100
    pub traffic_steps: Vec<u8>,

    /// Pause after each traffic step while health is polled
    pub evaluation_interval: Duration,

    /// Grace period at full weight before the previous pool is torn down
    pub termination_wait: Duration,

    /// Weight currently routed to the target pool
    pub target_weight: u8,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Every state change, oldest first
    pub transitions: Vec<StateTransition>,

    /// Set once the deployment enters RollingBack
    pub rollback: Option<RollbackReport>,
}

impl Deployment {
    pub fn new(
        artifact: String,
        target_pool: PoolLabel,
        traffic_steps: Vec<u8>,
        evaluation_interval: Duration,
        termination_wait: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            artifact,
            target_pool,
            state: DeploymentState::Pending,
            traffic_steps,
            evaluation_interval,
            termination_wait,
            target_weight: 0,
            started_at: Utc::now(),
            finished_at: None,
            transitions: Vec::new(),
            rollback: None,
        }
    }

    /// Moves to `to`, recording the transition
    ///
    /// Transitions out of a terminal state are ignored.
    pub fn transition(&mut self, to: DeploymentState) {
        if self.state.is_terminal() || self.state == to {
            return;
        }
        let now = Utc::now();
        self.transitions.push(StateTransition {
            from: self.state,
            to,
            at: now,
        });
        self.state = to;
        if to.is_terminal() {
            self.finished_at = Some(now);
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Release controller state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentState {
    Pending,
    /// Artifact is being installed on the idle pool; its weight is still 0
    Deploying,
    /// Weight is moving toward the target pool in discrete steps
    ShiftingTraffic,
    /// Full weight on the target pool, waiting out the termination grace period
    Observing,
    Completed,
    RollingBack,
    RolledBack,
}

impl DeploymentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentState::Completed | DeploymentState::RolledBack)
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: DeploymentState,
    pub to: DeploymentState,
    pub at: DateTime<Utc>,
}

/// Post-mortem record of why and from where a deployment rolled back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackReport {
    /// Error kind that triggered the rollback
    pub kind: ErrorKind,
    pub message: String,

    /// Weights in effect when the rollback was triggered
    pub blue_weight: u8,
    pub green_weight: u8,

    pub at: DateTime<Utc>,
}

/// Normalizes a list of traffic steps
///
/// Each step must be in 1..=100 and strictly increasing. A final step of 100
/// is appended when missing. An empty list yields the default steps.
pub fn normalize_traffic_steps(steps: &[u8]) -> Result<Vec<u8>, String> {
    if steps.is_empty() {
        return Ok(DEFAULT_TRAFFIC_STEPS.to_vec());
    }

    let mut previous = 0u8;
    for &step in steps {
        if step == 0 || step > 100 {
            return Err(format!("traffic step {} is outside 1..=100", step));
        }
        if step <= previous {
            return Err(format!(
                "traffic steps must be strictly increasing ({} after {})",
                step, previous
            ));
        }
        previous = step;
    }

    let mut normalized = steps.to_vec();
    if previous != 100 {
        normalized.push(100);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Deployment {
        Deployment::new(
            "v2".to_string(),
            PoolLabel::Green,
            vec![10, 50, 100],
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_transition_records_history() {
        let mut d = deployment();
        d.transition(DeploymentState::Deploying);
        d.transition(DeploymentState::ShiftingTraffic);

        assert_eq!(d.state, DeploymentState::ShiftingTraffic);
        assert_eq!(d.transitions.len(), 2);
        assert_eq!(d.transitions[0].from, DeploymentState::Pending);
        assert_eq!(d.transitions[1].to, DeploymentState::ShiftingTraffic);
        assert!(d.finished_at.is_none());
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut d = deployment();
        d.transition(DeploymentState::RollingBack);
        d.transition(DeploymentState::RolledBack);
        d.transition(DeploymentState::Deploying);

        assert_eq!(d.state, DeploymentState::RolledBack);
        assert!(d.finished_at.is_some());
        assert_eq!(d.transitions.len(), 2);
    }

    #[test]
    fn test_normalize_default_steps() {
        assert_eq!(normalize_traffic_steps(&[]).unwrap(), vec![10, 50, 100]);
    }

    #[test]
    fn test_normalize_appends_full_weight() {
        assert_eq!(normalize_traffic_steps(&[25, 75]).unwrap(), vec![25, 75, 100]);
    }

    #[test]
    fn test_normalize_rejects_bad_steps() {
        assert!(normalize_traffic_steps(&[0, 50]).is_err());
        assert!(normalize_traffic_steps(&[50, 50]).is_err());
        assert!(normalize_traffic_steps(&[60, 20]).is_err());
        assert!(normalize_traffic_steps(&[101]).is_err());
    }
}

//! Topology Registry
//!
//! Single source of truth for the two service pools, their traffic weights
//! and their health. Every mutation goes through one exclusive lock so the
//! weight invariant (blue + green == 100) holds for every observable state.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tandem_core::domain::error::ErrorKind;
use tandem_core::domain::pool::{HealthStatus, PoolLabel, ServicePool, Weights};
use tandem_core::dto::topology::TopologySnapshot;
use thiserror::Error;
use tokio::sync::watch;

/// Registry error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("invalid weights ({0}): each must be in 0..=100 and they must sum to 100")]
    InvalidWeight(Weights),

    #[error("inconsistent topology: {0}")]
    InconsistentTopology(String),
}

impl TopologyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TopologyError::InvalidWeight(_) => ErrorKind::InvalidWeight,
            TopologyError::InconsistentTopology(_) => ErrorKind::InconsistentTopology,
        }
    }
}

/// Latest effective health change, broadcast to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub pool: PoolLabel,
    pub status: HealthStatus,
}

#[derive(Debug)]
struct Topology {
    blue: ServicePool,
    green: ServicePool,
    last_active: PoolLabel,
    halted: Option<String>,
}

impl Topology {
    fn pool(&self, label: PoolLabel) -> &ServicePool {
        match label {
            PoolLabel::Blue => &self.blue,
            PoolLabel::Green => &self.green,
        }
    }

    fn pool_mut(&mut self, label: PoolLabel) -> &mut ServicePool {
        match label {
            PoolLabel::Blue => &mut self.blue,
            PoolLabel::Green => &mut self.green,
        }
    }

    fn weights(&self) -> Weights {
        Weights::new(self.blue.weight, self.green.weight)
    }
}

pub struct TopologyRegistry {
    inner: RwLock<Topology>,
    health_tx: watch::Sender<Option<HealthChange>>,
}

impl TopologyRegistry {
    /// Creates a registry with `active` carrying all traffic
    pub fn new(active: PoolLabel, blue_target_group: String, green_target_group: String) -> Self {
        let weights = Weights::routing(active, 100);
        let (health_tx, _) = watch::channel(None);

        Self {
            inner: RwLock::new(Topology {
                blue: ServicePool::new(PoolLabel::Blue, blue_target_group, weights.blue),
                green: ServicePool::new(PoolLabel::Green, green_target_group, weights.green),
                last_active: active,
                halted: None,
            }),
            health_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Topology> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Topology> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects weights outside 0..=100 or not summing to 100
    pub fn validate_weights(weights: Weights) -> Result<(), TopologyError> {
        if weights.is_valid() {
            Ok(())
        } else {
            Err(TopologyError::InvalidWeight(weights))
        }
    }

    /// Pool carrying full weight
    ///
    /// During a cutover this is the pool with the higher weight, ties broken
    /// toward the pool most recently given full weight.
    pub fn get_active(&self) -> Result<ServicePool, TopologyError> {
        let topology = self.read();
        Self::ensure_consistent(&topology)?;

        let label = match topology.blue.weight.cmp(&topology.green.weight) {
            std::cmp::Ordering::Greater => PoolLabel::Blue,
            std::cmp::Ordering::Less => PoolLabel::Green,
            std::cmp::Ordering::Equal => topology.last_active,
        };

        Ok(topology.pool(label).clone())
    }

    /// Complement of [`get_active`](Self::get_active)
    pub fn get_idle(&self) -> Result<ServicePool, TopologyError> {
        let active = self.get_active()?;
        Ok(self.pool(active.label.other()))
    }

    /// Sets both weights atomically
    ///
    /// Fails without touching state when the weights are invalid or the
    /// registry is halted.
    pub fn set_weights(&self, weights: Weights) -> Result<(), TopologyError> {
        Self::validate_weights(weights)?;

        let mut topology = self.write();
        if let Some(reason) = &topology.halted {
            return Err(TopologyError::InconsistentTopology(format!(
                "automated weight changes are halted: {}",
                reason
            )));
        }

        topology.blue.weight = weights.blue;
        topology.green.weight = weights.green;
        for label in PoolLabel::ALL {
            if weights.of(label) == 100 {
                topology.last_active = label;
            }
        }

        tracing::info!("Topology weights set to {}", weights);
        Ok(())
    }

    /// Records a health signal for a pool
    ///
    /// Returns whether the status changed. Repeating the current status is a
    /// no-op and notifies nobody.
    pub fn mark_health(&self, label: PoolLabel, status: HealthStatus) -> bool {
        {
            let mut topology = self.write();
            let pool = topology.pool_mut(label);
            if pool.health == status {
                return false;
            }
            tracing::info!("Pool {} health: {} -> {}", label, pool.health, status);
            pool.health = status;
        }

        self.health_tx
            .send_replace(Some(HealthChange { pool: label, status }));
        true
    }

    /// Records the artifact now running on a pool
    pub fn set_artifact(&self, label: PoolLabel, artifact: &str) {
        self.write().pool_mut(label).artifact_version = Some(artifact.to_string());
    }

    /// Forgets the artifact of a torn down pool
    pub fn clear_artifact(&self, label: PoolLabel) {
        self.write().pool_mut(label).artifact_version = None;
    }

    /// Copy of a single pool
    pub fn pool(&self, label: PoolLabel) -> ServicePool {
        self.read().pool(label).clone()
    }

    pub fn weights(&self) -> Weights {
        self.read().weights()
    }

    /// Consistent copy of both pools
    pub fn snapshot(&self) -> TopologySnapshot {
        let topology = self.read();
        TopologySnapshot {
            blue: topology.blue.clone(),
            green: topology.green.clone(),
            last_active: topology.last_active,
            halted: topology.halted.clone(),
        }
    }

    /// Stops automated weight changes until an operator resolves the topology
    pub fn halt(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!("Topology halted: {}", reason);
        self.write().halted = Some(reason);
    }

    /// Errors while the registry is halted
    pub fn check_consistent(&self) -> Result<(), TopologyError> {
        Self::ensure_consistent(&self.read())
    }

    /// Operator override: clears a halt and sets the weights actually in effect
    pub fn resolve(&self, weights: Weights) -> Result<(), TopologyError> {
        Self::validate_weights(weights)?;
        {
            let mut topology = self.write();
            topology.halted = None;
        }
        tracing::warn!("Topology halt resolved by operator");
        self.set_weights(weights)
    }

    /// Receiver for health changes
    pub fn subscribe_health(&self) -> watch::Receiver<Option<HealthChange>> {
        self.health_tx.subscribe()
    }

    fn ensure_consistent(topology: &Topology) -> Result<(), TopologyError> {
        if let Some(reason) = &topology.halted {
            return Err(TopologyError::InconsistentTopology(reason.clone()));
        }

        let weights = topology.weights();
        if !weights.is_valid() {
            return Err(TopologyError::InconsistentTopology(format!(
                "weights {} do not sum to 100",
                weights
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TopologyRegistry {
        TopologyRegistry::new(
            PoolLabel::Blue,
            "app-dev-blueTG".to_string(),
            "app-dev-greenTG".to_string(),
        )
    }

    #[test]
    fn test_fresh_topology() {
        let registry = registry();
        assert_eq!(registry.get_active().unwrap().label, PoolLabel::Blue);
        assert_eq!(registry.get_idle().unwrap().label, PoolLabel::Green);
        assert_eq!(registry.weights(), Weights::new(100, 0));
    }

    #[test]
    fn test_invalid_weights_do_not_mutate() {
        let registry = registry();

        let result = registry.set_weights(Weights::new(60, 50));
        assert_eq!(
            result,
            Err(TopologyError::InvalidWeight(Weights::new(60, 50)))
        );
        assert_eq!(registry.weights(), Weights::new(100, 0));

        assert!(registry.set_weights(Weights::new(200, 156)).is_err());
        assert_eq!(registry.weights(), Weights::new(100, 0));
    }

    #[test]
    fn test_mid_cutover_active_is_heavier_pool() {
        let registry = registry();
        registry.set_weights(Weights::new(40, 60)).unwrap();
        assert_eq!(registry.get_active().unwrap().label, PoolLabel::Green);

        registry.set_weights(Weights::new(90, 10)).unwrap();
        assert_eq!(registry.get_active().unwrap().label, PoolLabel::Blue);
    }

    #[test]
    fn test_tie_breaks_toward_last_active() {
        let registry = registry();
        registry.set_weights(Weights::new(50, 50)).unwrap();
        assert_eq!(registry.get_active().unwrap().label, PoolLabel::Blue);

        registry.set_weights(Weights::new(0, 100)).unwrap();
        registry.set_weights(Weights::new(50, 50)).unwrap();
        assert_eq!(registry.get_active().unwrap().label, PoolLabel::Green);
        assert_eq!(registry.get_idle().unwrap().label, PoolLabel::Blue);
    }

    #[test]
    fn test_weights_always_sum_to_100() {
        let registry = registry();
        for (blue, green) in [(90, 10), (50, 60), (0, 100), (101, 0), (30, 70)] {
            let _ = registry.set_weights(Weights::new(blue, green));
            let snapshot = registry.snapshot();
            assert_eq!(
                u16::from(snapshot.blue.weight) + u16::from(snapshot.green.weight),
                100
            );
        }
    }

    #[test]
    fn test_mark_health_is_idempotent() {
        let registry = registry();
        let mut rx = registry.subscribe_health();

        assert!(registry.mark_health(PoolLabel::Green, HealthStatus::Healthy));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(!registry.mark_health(PoolLabel::Green, HealthStatus::Healthy));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(registry.pool(PoolLabel::Green).health, HealthStatus::Healthy);
    }

    #[test]
    fn test_halt_blocks_weight_changes_until_resolved() {
        let registry = registry();
        registry.halt("router reported blue=80 green=20");

        assert!(matches!(
            registry.get_active(),
            Err(TopologyError::InconsistentTopology(_))
        ));
        assert!(matches!(
            registry.set_weights(Weights::new(0, 100)),
            Err(TopologyError::InconsistentTopology(_))
        ));

        registry.resolve(Weights::new(100, 0)).unwrap();
        assert!(registry.check_consistent().is_ok());
        assert_eq!(registry.get_active().unwrap().label, PoolLabel::Blue);
    }

    #[test]
    fn test_artifact_tracking() {
        let registry = registry();
        registry.set_artifact(PoolLabel::Green, "app:v2");
        assert_eq!(
            registry.pool(PoolLabel::Green).artifact_version.as_deref(),
            Some("app:v2")
        );
        registry.clear_artifact(PoolLabel::Green);
        assert!(registry.pool(PoolLabel::Green).artifact_version.is_none());
    }
}

//! Topology DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pool::{HealthStatus, PoolLabel, ServicePool};

/// Consistent view of both pools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub blue: ServicePool,
    pub green: ServicePool,

    /// Pool most recently given full weight
    pub last_active: PoolLabel,

    /// Set while automated weight changes are halted
    pub halted: Option<String>,
}

impl TopologySnapshot {
    pub fn pool(&self, label: PoolLabel) -> &ServicePool {
        match label {
            PoolLabel::Blue => &self.blue,
            PoolLabel::Green => &self.green,
        }
    }
}

/// Health signal for one pool
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthReport {
    pub pool: PoolLabel,
    pub status: HealthStatus,
}

//! Artifact installer
//!
//! Rolls an artifact onto a pool (a new task set on the target group) and
//! tears a pool down once it no longer carries traffic.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tandem_core::domain::pool::PoolLabel;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to install artifact: {0}")]
pub struct InstallError(pub String);

/// Integration trait for the service that runs pool workloads
#[async_trait]
pub trait ArtifactInstaller: Send + Sync {
    /// Installs `artifact` on `pool`, replacing whatever ran there
    async fn install(&self, pool: PoolLabel, artifact: &str) -> Result<(), InstallError>;

    /// Stops the workload of `pool`
    async fn teardown(&self, pool: PoolLabel) -> Result<(), InstallError>;
}

/// Installer that tracks pool workloads in memory
#[derive(Default)]
pub struct InMemoryInstaller {
    running: Mutex<HashMap<PoolLabel, String>>,
}

impl InMemoryInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifact running on `pool`, if any
    pub fn running(&self, pool: PoolLabel) -> Option<String> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pool)
            .cloned()
    }
}

#[async_trait]
impl ArtifactInstaller for InMemoryInstaller {
    async fn install(&self, pool: PoolLabel, artifact: &str) -> Result<(), InstallError> {
        if artifact.trim().is_empty() {
            return Err(InstallError("artifact reference is empty".to_string()));
        }

        tracing::info!("Installing {} on {} pool", artifact, pool);
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pool, artifact.to_string());
        Ok(())
    }

    async fn teardown(&self, pool: PoolLabel) -> Result<(), InstallError> {
        tracing::info!("Tearing down {} pool", pool);
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pool);
        Ok(())
    }
}

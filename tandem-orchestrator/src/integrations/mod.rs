//! Integrations layer
//!
//! Seams to the external systems the release controller drives: the traffic
//! router (load balancer), the health monitor and the artifact installer.
//!
//! All integrations are trait-based so the controller can be exercised
//! without a live load balancer or service cluster.

mod health;
mod installer;
mod router;

// Re-export traits
pub use health::{HealthCheckError, HealthMonitor};
pub use installer::{ArtifactInstaller, InstallError};
pub use router::{RouterError, TrafficRouter};

// Re-export implementations
pub use health::{HttpHealthMonitor, RegistryHealthMonitor};
pub use installer::InMemoryInstaller;
pub use router::InMemoryRouter;

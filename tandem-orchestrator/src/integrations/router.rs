//! Traffic router
//!
//! Applies weight changes to the load balancer listener that fronts the two
//! target groups, and reports the weights actually in effect.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use tandem_core::domain::pool::Weights;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("traffic router error: {0}")]
pub struct RouterError(pub String);

/// Integration trait for the load balancer's weighted forward action
#[async_trait]
pub trait TrafficRouter: Send + Sync {
    /// Applies new weights
    ///
    /// # Returns
    /// The weights in effect after the change, for verification
    async fn apply(&self, weights: Weights) -> Result<Weights, RouterError>;

    /// Weights currently in effect
    async fn current(&self) -> Result<Weights, RouterError>;
}

/// In-process router that keeps the listener weights in memory
///
/// Every applied change is kept in order, which makes the full traffic
/// history of a cutover observable.
pub struct InMemoryRouter {
    state: Mutex<RouterState>,
}

struct RouterState {
    current: Weights,
    history: Vec<Weights>,
}

impl InMemoryRouter {
    pub fn new(initial: Weights) -> Self {
        Self {
            state: Mutex::new(RouterState {
                current: initial,
                history: Vec::new(),
            }),
        }
    }

    /// Every weight change applied so far, oldest first
    pub fn history(&self) -> Vec<Weights> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }
}

#[async_trait]
impl TrafficRouter for InMemoryRouter {
    async fn apply(&self, weights: Weights) -> Result<Weights, RouterError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.current = weights;
        state.history.push(weights);
        tracing::debug!("Listener weights applied: {}", weights);
        Ok(state.current)
    }

    async fn current(&self) -> Result<Weights, RouterError> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_router_records_history() {
        let router = InMemoryRouter::new(Weights::new(100, 0));
        assert_eq!(router.current().await.unwrap(), Weights::new(100, 0));

        router.apply(Weights::new(90, 10)).await.unwrap();
        let effective = router.apply(Weights::new(50, 50)).await.unwrap();

        assert_eq!(effective, Weights::new(50, 50));
        assert_eq!(
            router.history(),
            vec![Weights::new(90, 10), Weights::new(50, 50)]
        );
    }
}

//! Configuration module
//!
//! Handles CLI configuration including orchestrator URL and output format.

use tandem_client::OrchestratorClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,

    /// Print raw JSON instead of formatted output
    pub json: bool,
}

impl Config {
    pub fn client(&self) -> OrchestratorClient {
        OrchestratorClient::new(&self.orchestrator_url)
    }
}

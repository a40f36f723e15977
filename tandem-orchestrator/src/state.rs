//! Shared application state handed to every API handler

use std::sync::Arc;

use crate::repository::TopologyRegistry;
use crate::service::{PipelineSequencer, ReleaseController};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TopologyRegistry>,
    pub controller: Arc<ReleaseController>,
    pub sequencer: Arc<PipelineSequencer>,
}

impl AppState {
    pub fn new(controller: Arc<ReleaseController>, sequencer: Arc<PipelineSequencer>) -> Self {
        Self {
            registry: Arc::clone(controller.registry()),
            controller,
            sequencer,
        }
    }
}

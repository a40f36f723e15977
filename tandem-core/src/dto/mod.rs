//! Data Transfer Objects for orchestrator communication
//!
//! This module contains DTOs exchanged between the orchestrator API and its
//! clients (the `tandem` CLI, health monitors, the build system).

pub mod deployment;
pub mod pipeline;
pub mod topology;

//! Tandem Core
//!
//! Core types and abstractions for the Tandem blue/green release orchestrator.
//!
//! This crate contains:
//! - Domain types: Core business entities (ServicePool, Deployment, PipelineRun)
//! - DTOs: Data transfer objects for orchestrator/client communication

pub mod domain;
pub mod dto;

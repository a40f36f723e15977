//! Core domain types
//!
//! This module contains the core domain structures used across Tandem crates.
//! These types represent the fundamental entities of a blue/green release and
//! are shared between the orchestrator (which owns and mutates them) and the
//! client and CLI (which display them).

pub mod deployment;
pub mod error;
pub mod pipeline;
pub mod pool;

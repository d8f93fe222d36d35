//! Shared domain types for nodeflow.
//!
//! Workflow graphs, execution records, lifecycle events, stored workflows,
//! configuration and error types used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod graph;
pub mod workflow;

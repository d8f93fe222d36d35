//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (nodeflow-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod execution;
pub mod workflow;

pub use execution::ExecutionRepository;
pub use workflow::WorkflowRepository;

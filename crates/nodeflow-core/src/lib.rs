//! Execution engine, step executors and repository traits for nodeflow.
//!
//! This crate defines the "ports" (repository and transport traits) that the
//! infrastructure layer implements. It depends only on `nodeflow-types` --
//! never on `nodeflow-infra`, a database or an HTTP client.

pub mod context;
pub mod engine;
pub mod event;
pub mod repository;
pub mod step;
pub mod transport;

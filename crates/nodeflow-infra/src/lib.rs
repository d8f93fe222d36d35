//! Infrastructure layer for nodeflow.
//!
//! Contains implementations of the ports defined in `nodeflow-core`: SQLite
//! storage for workflows and execution history, the reqwest HTTP transport,
//! the OpenAI/Anthropic chat transport, and the configuration loader.

pub mod config;
pub mod http;
pub mod llm;
pub mod sqlite;

//! Step executor capability and the built-in node-type handlers.
//!
//! Every node type is one `StepExecutor` implementation registered in a
//! [`registry::StepRegistry`] under its type string. The engine only ever
//! calls `execute`, `routes_by_branch` and `selects`; it never matches on
//! type names.

pub mod ai;
pub mod box_step;
pub mod branch;
pub mod code;
pub mod delay;
pub mod http;
pub mod notify;
pub mod registry;
pub mod script;
pub mod transform;
pub mod trigger;
pub mod value;

use std::future::Future;

use nodeflow_types::graph::Record;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::transport::TransportError;

use self::script::ScriptError;

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Output of one step invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub output: Record,
    /// Branch tag selecting which outgoing connections stay live.
    pub branch: Option<String>,
}

impl StepResult {
    pub fn new(output: Record) -> Self {
        Self {
            output,
            branch: None,
        }
    }

    pub fn with_branch(output: Record, branch: impl Into<String>) -> Self {
        Self {
            output,
            branch: Some(branch.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors raised by step executors. Any of these fails the whole run.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("invalid node config: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// StepExecutor trait
// ---------------------------------------------------------------------------

/// A node-type handler.
///
/// Uses RPITIT for `execute`; see [`box_step::BoxStepExecutor`] for the
/// object-safe wrapper stored in the registry.
pub trait StepExecutor: Send + Sync {
    /// Run the step against the gathered input.
    fn execute(
        &self,
        config: &Record,
        input: &Record,
        ctx: &ExecutionContext,
    ) -> impl Future<Output = Result<StepResult, StepError>> + Send;

    /// Whether the returned branch tag filters outgoing connections.
    fn routes_by_branch(&self) -> bool {
        false
    }

    /// Whether an outgoing connection with `source_handle` follows `branch`.
    fn selects(&self, branch: &str, source_handle: &str) -> bool {
        branch == source_handle
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Deserialize a node's config map into a typed settings struct.
pub(crate) fn parse_config<T: DeserializeOwned>(config: &Record) -> Result<T, StepError> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| StepError::InvalidConfig(e.to_string()))
}

/// `value` unless it is empty.
pub(crate) fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

/// Copy of `input` with `fields` appended (existing keys are overwritten).
pub(crate) fn extend(input: &Record, fields: impl IntoIterator<Item = (&'static str, Value)>) -> Record {
    let mut output = input.clone();
    for (key, value) in fields {
        output.insert(key.to_string(), value);
    }
    output
}

/// Current time in the `2024-01-01T00:00:00.000Z` form used in outputs.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

//! Execution lifecycle events published on the event bus.
//!
//! The wire format (`{"type": "node:complete", "executionId": ..., ...}`)
//! is what WebSocket subscribers receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::execution::NodeExecutionStatus;
use crate::graph::Record;

/// Events emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ExecutionEvent {
    #[serde(rename = "execution:start")]
    ExecutionStarted { workflow_id: Uuid },

    #[serde(rename = "node:start")]
    NodeStarted { node_id: String },

    /// A node finished. `output` is absent for skipped nodes and triggers.
    #[serde(rename = "node:complete")]
    NodeCompleted {
        node_id: String,
        status: NodeExecutionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Record>,
    },

    #[serde(rename = "node:error")]
    NodeFailed { node_id: String, error: String },

    #[serde(rename = "execution:complete")]
    ExecutionCompleted,

    #[serde(rename = "execution:error")]
    ExecutionFailed { error: String },
}

impl ExecutionEvent {
    /// True for the two events that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionEvent::ExecutionCompleted | ExecutionEvent::ExecutionFailed { .. }
        )
    }
}

/// An event stamped with the run it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub execution_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ExecutionEvent,
}

impl EventEnvelope {
    pub fn new(execution_id: Uuid, event: ExecutionEvent) -> Self {
        Self {
            execution_id,
            timestamp: Utc::now(),
            event,
        }
    }
}

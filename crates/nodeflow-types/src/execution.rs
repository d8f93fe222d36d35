//! Execution records: one `Execution` per run, one `NodeExecution` per
//! visited or skipped node.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trigger type recorded when the caller does not supply one.
pub const DEFAULT_TRIGGER_TYPE: &str = "manual";

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a run.
///
/// A run is created `Running` and moves exactly once to `Success` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Success,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "error" => Ok(ExecutionStatus::Error),
            other => Err(format!("invalid execution status: '{other}'")),
        }
    }
}

/// Terminal state of a single node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeExecutionStatus {
    Success,
    Error,
    Skipped,
}

impl NodeExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeExecutionStatus::Success => "success",
            NodeExecutionStatus::Error => "error",
            NodeExecutionStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for NodeExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(NodeExecutionStatus::Success),
            "error" => Ok(NodeExecutionStatus::Error),
            "skipped" => Ok(NodeExecutionStatus::Skipped),
            other => Err(format!("invalid node execution status: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One run of a workflow from trigger to terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// How the run was started (e.g. "manual", "webhook").
    pub trigger_type: String,
    pub created_at: DateTime<Utc>,
}

impl Execution {
    /// A freshly started run.
    pub fn started(id: Uuid, workflow_id: Uuid, trigger_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            workflow_id,
            status: ExecutionStatus::Running,
            started_at: now,
            finished_at: None,
            error_message: None,
            trigger_type: trigger_type.into(),
            created_at: now,
        }
    }
}

/// Terminal update applied to an `Execution`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
    pub status: ExecutionStatus,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ExecutionUpdate {
    pub fn success() -> Self {
        Self {
            status: ExecutionStatus::Success,
            finished_at: Some(Utc::now()),
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            finished_at: Some(Utc::now()),
            error_message: Some(message.into()),
        }
    }
}

/// The record of one node's participation (or skip) in a run.
///
/// Input and output snapshots are stored as serialized JSON text so the
/// storage layer stays agnostic of their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    pub status: NodeExecutionStatus,
    #[serde(default)]
    pub input_data: Option<String>,
    #[serde(default)]
    pub output_data: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_storage_format() {
        assert_eq!(ExecutionStatus::Running.to_string(), "running");
        assert_eq!("error".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Error);
        assert!("paused".parse::<ExecutionStatus>().is_err());

        assert_eq!(NodeExecutionStatus::Skipped.as_str(), "skipped");
        assert_eq!(
            "success".parse::<NodeExecutionStatus>().unwrap(),
            NodeExecutionStatus::Success
        );
    }

    #[test]
    fn status_serde_is_snake_case() {
        let json = serde_json::to_string(&ExecutionStatus::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }

    #[test]
    fn started_execution_is_running() {
        let exec = Execution::started(Uuid::now_v7(), Uuid::now_v7(), DEFAULT_TRIGGER_TYPE);
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert!(!exec.status.is_terminal());
        assert!(exec.finished_at.is_none());
        assert_eq!(exec.trigger_type, "manual");
    }

    #[test]
    fn error_update_carries_message() {
        let update = ExecutionUpdate::error("boom");
        assert_eq!(update.status, ExecutionStatus::Error);
        assert!(update.status.is_terminal());
        assert_eq!(update.error_message.as_deref(), Some("boom"));
        assert!(update.finished_at.is_some());
    }
}

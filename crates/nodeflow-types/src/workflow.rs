//! Stored workflow definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::WorkflowGraph;

/// Name given to workflows created without one.
pub const DEFAULT_WORKFLOW_NAME: &str = "Untitled Workflow";

/// A persisted workflow: metadata plus its graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub graph: WorkflowGraph,
    /// Inactive workflows do not accept webhook calls.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredWorkflow {
    /// A new, active workflow with an empty graph.
    pub fn new(name: Option<String>, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_WORKFLOW_NAME.to_string()),
            description: description.unwrap_or_default(),
            graph: WorkflowGraph::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a stored workflow. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub graph: Option<WorkflowGraph>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl WorkflowPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.graph.is_none()
            && self.is_active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_workflow_defaults() {
        let wf = StoredWorkflow::new(None, None);
        assert_eq!(wf.name, DEFAULT_WORKFLOW_NAME);
        assert!(wf.description.is_empty());
        assert!(wf.is_active);
        assert!(wf.graph.nodes.is_empty());

        let blank = StoredWorkflow::new(Some("  ".into()), Some("d".into()));
        assert_eq!(blank.name, DEFAULT_WORKFLOW_NAME);
        assert_eq!(blank.description, "d");
    }

    #[test]
    fn patch_deserializes_partially() {
        let patch: WorkflowPatch = serde_json::from_str(r#"{"is_active": false}"#).unwrap();
        assert_eq!(patch.is_active, Some(false));
        assert!(patch.name.is_none());
        assert!(!patch.is_empty());
        assert!(WorkflowPatch::default().is_empty());
    }
}

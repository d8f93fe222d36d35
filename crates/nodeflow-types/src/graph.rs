//! Workflow graph model: typed step nodes joined by directed connections.
//!
//! The JSON shape matches what the canvas editor saves (camelCase keys).
//! Positions and the viewport are carried for round-tripping but ignored
//! by the engine.

use serde::{Deserialize, Serialize};

/// A JSON object flowing between steps.
///
/// Trigger payloads, step inputs and step outputs are all records.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Key under which the engine wraps the outputs of several producers.
pub const MERGE_INPUTS_KEY: &str = "__mergeInputs";

/// A directed graph of step nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub connections: Vec<WorkflowConnection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl WorkflowGraph {
    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// One step in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    /// Type string selecting the step executor (e.g. `"setData"`).
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
}

impl WorkflowNode {
    /// Display label, falling back to the node id when unset.
    pub fn label(&self) -> &str {
        if self.data.label.is_empty() {
            &self.id
        } else {
            &self.data.label
        }
    }
}

/// Editor-facing node payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub config: Record,
}

/// Canvas coordinates. Unused by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Canvas viewport. Unused by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

fn default_zoom() -> f64 {
    1.0
}

/// A directed link from a source node's output handle to a target node's
/// input handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConnection {
    #[serde(default)]
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl WorkflowConnection {
    /// Key used for this connection inside a merged multi-input record.
    pub fn input_key(&self) -> String {
        match &self.target_handle {
            Some(handle) => handle.clone(),
            None => format!("input_{}", self.source),
        }
    }
}

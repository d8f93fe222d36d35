//! Per-run store of node outputs.
//!
//! An `ExecutionContext` is created by the engine at the start of a run,
//! written as each node completes, and dropped when the run returns. It is
//! never shared between runs; step executors only get a shared reference.

use std::collections::HashMap;

use nodeflow_types::graph::Record;
use uuid::Uuid;

/// Node outputs recorded during one run, keyed by node id.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    execution_id: Uuid,
    workflow_id: Uuid,
    outputs: HashMap<String, Record>,
}

impl ExecutionContext {
    pub fn new(execution_id: Uuid, workflow_id: Uuid) -> Self {
        Self {
            execution_id,
            workflow_id,
            outputs: HashMap::new(),
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    /// Record a node's output, replacing any previous value.
    pub fn set_output(&mut self, node_id: impl Into<String>, output: Record) {
        self.outputs.insert(node_id.into(), output);
    }

    pub fn get_output(&self, node_id: &str) -> Option<&Record> {
        self.outputs.get(node_id)
    }

    pub fn has_output(&self, node_id: &str) -> bool {
        self.outputs.contains_key(node_id)
    }

    /// Number of nodes with a recorded output.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

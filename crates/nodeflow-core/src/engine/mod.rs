//! Workflow execution engine.
//!
//! `ExecutionEngine::execute` walks a workflow graph from its entry
//! (trigger) nodes, running one node at a time through the step registry.
//!
//! # Execution flow
//!
//! 1. Persist a `running` Execution and publish `execution:start`.
//! 2. Seed every entry node with the trigger payload (no executor call).
//! 3. Pop ready nodes FIFO. A node is ready once every incoming
//!    connection's source has recorded output (see [`frontier`]); its
//!    input is gathered from all of those sources.
//! 4. Run the node's executor, persist a NodeExecution, publish events,
//!    then release its outgoing connections. A routing step keeps only
//!    the connections whose handle matches its branch; the other targets
//!    get a `skipped` record.
//! 5. The first failure ends the run, as does a node left waiting on a
//!    producer that never ran. Otherwise the run succeeds with the output
//!    of the last node that ran.
//!
//! Persistence failures are logged and never change the outcome.

mod frontier;

use std::sync::Arc;

use chrono::Utc;
use nodeflow_types::config::EngineConfig;
use nodeflow_types::event::ExecutionEvent;
use nodeflow_types::execution::{
    Execution, ExecutionStatus, ExecutionUpdate, NodeExecution, NodeExecutionStatus,
};
use nodeflow_types::graph::{Record, WorkflowGraph, WorkflowNode, MERGE_INPUTS_KEY};
use serde_json::Value;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::event::EventBus;
use crate::repository::ExecutionRepository;
use crate::step::registry::StepRegistry;

use self::frontier::Frontier;

// ---------------------------------------------------------------------------
// Errors and outcome
// ---------------------------------------------------------------------------

/// Reasons a run ends in `error`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("No trigger node found in workflow")]
    NoTrigger,

    #[error("Execution exceeded maximum iterations - possible cycle detected")]
    IterationLimit,

    #[error("Execution stalled on unresolved nodes [{}] - possible cycle detected", .0.join(", "))]
    Stalled(Vec<String>),

    #[error("Node \"{label}\" failed: {message}")]
    NodeFailed { label: String, message: String },
}

impl EngineError {
    /// Text carried by the `execution:error` event. Node failures report
    /// the step's own message; the stored error names the node.
    pub fn event_message(&self) -> String {
        match self {
            EngineError::NodeFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    /// Output of the last node that ran; `None` on failure or when only
    /// triggers ran.
    pub output: Option<Record>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

// ---------------------------------------------------------------------------
// ExecutionEngine
// ---------------------------------------------------------------------------

/// Single-run graph walker. Cheap to share; concurrent runs only share the
/// registry, the event bus and the repository.
pub struct ExecutionEngine<R: ExecutionRepository> {
    repo: Arc<R>,
    events: EventBus,
    registry: Arc<StepRegistry>,
    config: EngineConfig,
}

impl<R: ExecutionRepository> ExecutionEngine<R> {
    pub fn new(
        repo: Arc<R>,
        events: EventBus,
        registry: Arc<StepRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repo,
            events,
            registry,
            config,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Run `graph` with `trigger_data`. Never returns an error; failures
    /// are recorded on the Execution and reported in the outcome.
    pub async fn execute(
        &self,
        execution_id: Uuid,
        workflow_id: Uuid,
        graph: &WorkflowGraph,
        trigger_data: Record,
        trigger_type: &str,
    ) -> ExecutionOutcome {
        tracing::info!(
            execution_id = %execution_id,
            workflow_id = %workflow_id,
            trigger_type,
            nodes = graph.nodes.len(),
            "execution started"
        );

        let execution = Execution::started(execution_id, workflow_id, trigger_type);
        if let Err(e) = self.repo.create_execution(&execution).await {
            tracing::warn!(execution_id = %execution_id, error = %e, "failed to record execution start");
        }
        self.events
            .publish(execution_id, ExecutionEvent::ExecutionStarted { workflow_id });

        let mut ctx = ExecutionContext::new(execution_id, workflow_id);
        let result = self.run(&mut ctx, graph, trigger_data).await;

        let (update, outcome) = match result {
            Ok(output) => {
                tracing::info!(execution_id = %execution_id, "execution completed");
                self.events
                    .publish(execution_id, ExecutionEvent::ExecutionCompleted);
                (
                    ExecutionUpdate::success(),
                    ExecutionOutcome {
                        execution_id,
                        status: ExecutionStatus::Success,
                        output,
                        error: None,
                    },
                )
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(execution_id = %execution_id, error = %message, "execution failed");
                self.events.publish(
                    execution_id,
                    ExecutionEvent::ExecutionFailed {
                        error: err.event_message(),
                    },
                );
                (
                    ExecutionUpdate::error(message.clone()),
                    ExecutionOutcome {
                        execution_id,
                        status: ExecutionStatus::Error,
                        output: None,
                        error: Some(message),
                    },
                )
            }
        };

        if let Err(e) = self.repo.update_execution(&execution_id, &update).await {
            tracing::warn!(execution_id = %execution_id, error = %e, "failed to record execution result");
        }
        outcome
    }

    async fn run(
        &self,
        ctx: &mut ExecutionContext,
        graph: &WorkflowGraph,
        trigger_data: Record,
    ) -> Result<Option<Record>, EngineError> {
        let entries: Vec<&WorkflowNode> = graph
            .nodes
            .iter()
            .filter(|n| self.config.is_entry_type(&n.node_type))
            .collect();
        if entries.is_empty() {
            return Err(EngineError::NoTrigger);
        }

        let mut frontier = Frontier::new(graph);

        let serialized_trigger = to_json(&trigger_data);
        for entry in &entries {
            let now = Utc::now();
            ctx.set_output(entry.id.clone(), trigger_data.clone());
            self.record_node(NodeExecution {
                id: Uuid::now_v7(),
                execution_id: ctx.execution_id(),
                node_id: entry.id.clone(),
                node_type: entry.node_type.clone(),
                status: NodeExecutionStatus::Success,
                input_data: Some(serialized_trigger.clone()),
                output_data: Some(serialized_trigger.clone()),
                error_message: None,
                started_at: now,
                finished_at: now,
            })
            .await;
            self.events.publish(
                ctx.execution_id(),
                ExecutionEvent::NodeCompleted {
                    node_id: entry.id.clone(),
                    status: NodeExecutionStatus::Success,
                    output: None,
                },
            );
            frontier.mark_visited(entry.id.as_str());
        }
        for entry in &entries {
            frontier.complete(&entry.id, |_| true);
        }

        let max_iterations = self.config.iteration_factor * graph.nodes.len();
        let mut iterations = 0usize;
        let mut last_output = None;

        while let Some(node_id) = frontier.pop() {
            iterations += 1;
            if iterations > max_iterations {
                return Err(EngineError::IterationLimit);
            }
            if frontier.is_visited(node_id) {
                continue;
            }
            let Some(node) = graph.node(node_id) else {
                continue;
            };
            frontier.mark_visited(node_id);

            let input = gather_inputs(&frontier.inputs(node_id), ctx);
            let (output, branch) = self.run_node(node, &input, ctx).await?;

            ctx.set_output(node_id, output.clone());
            last_output = Some(output);

            let executor = self.registry.get(&node.node_type);
            let routed = branch.filter(|_| executor.is_some_and(|e| e.routes_by_branch()));
            let settlement = frontier.complete(node_id, |conn| match (&routed, &conn.source_handle) {
                (Some(branch), Some(handle)) => {
                    executor.is_some_and(|e| e.selects(branch, handle))
                }
                (Some(_), None) => false,
                (None, _) => true,
            });

            for skipped in &settlement.skipped {
                self.record_skip(skipped, graph, &input, ctx).await;
            }
        }

        let stalled = frontier.stalled();
        if !stalled.is_empty() {
            return Err(EngineError::Stalled(
                stalled.into_iter().map(str::to_string).collect(),
            ));
        }

        Ok(last_output)
    }

    /// Execute one node and record the result. Returns the output and the
    /// branch tag, or the run-ending error.
    async fn run_node(
        &self,
        node: &WorkflowNode,
        input: &Record,
        ctx: &ExecutionContext,
    ) -> Result<(Record, Option<String>), EngineError> {
        let execution_id = ctx.execution_id();
        tracing::debug!(
            execution_id = %execution_id,
            node_id = %node.id,
            node_type = %node.node_type,
            "node started"
        );
        self.events.publish(
            execution_id,
            ExecutionEvent::NodeStarted {
                node_id: node.id.clone(),
            },
        );

        let started_at = Utc::now();
        let result = match self.registry.get(&node.node_type) {
            Some(executor) => executor
                .execute(&node.data.config, input, ctx)
                .await
                .map_err(|e| e.to_string()),
            None => Err(format!("No executor for node type: {}", node.node_type)),
        };
        let finished_at = Utc::now();

        let mut record = NodeExecution {
            id: Uuid::now_v7(),
            execution_id,
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            status: NodeExecutionStatus::Success,
            input_data: Some(to_json(input)),
            output_data: None,
            error_message: None,
            started_at,
            finished_at,
        };

        match result {
            Ok(step) => {
                record.output_data = Some(to_json(&step.output));
                self.record_node(record).await;
                tracing::debug!(
                    execution_id = %execution_id,
                    node_id = %node.id,
                    branch = step.branch.as_deref().unwrap_or(""),
                    "node completed"
                );
                self.events.publish(
                    execution_id,
                    ExecutionEvent::NodeCompleted {
                        node_id: node.id.clone(),
                        status: NodeExecutionStatus::Success,
                        output: Some(step.output.clone()),
                    },
                );
                Ok((step.output, step.branch))
            }
            Err(message) => {
                tracing::warn!(
                    execution_id = %execution_id,
                    node_id = %node.id,
                    node_type = %node.node_type,
                    error = %message,
                    "node failed"
                );
                record.status = NodeExecutionStatus::Error;
                record.error_message = Some(message.clone());
                self.record_node(record).await;
                self.events.publish(
                    execution_id,
                    ExecutionEvent::NodeFailed {
                        node_id: node.id.clone(),
                        error: message.clone(),
                    },
                );
                Err(EngineError::NodeFailed {
                    label: node.label().to_string(),
                    message,
                })
            }
        }
    }

    /// Record a node cut off by a branch filter. `input` is the input of
    /// the routing node that cut it.
    async fn record_skip(
        &self,
        node_id: &str,
        graph: &WorkflowGraph,
        input: &Record,
        ctx: &ExecutionContext,
    ) {
        let Some(node) = graph.node(node_id) else {
            return;
        };
        tracing::debug!(execution_id = %ctx.execution_id(), node_id, "node skipped");

        let now = Utc::now();
        self.record_node(NodeExecution {
            id: Uuid::now_v7(),
            execution_id: ctx.execution_id(),
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            status: NodeExecutionStatus::Skipped,
            input_data: Some(to_json(input)),
            output_data: None,
            error_message: None,
            started_at: now,
            finished_at: now,
        })
        .await;
        self.events.publish(
            ctx.execution_id(),
            ExecutionEvent::NodeCompleted {
                node_id: node.id.clone(),
                status: NodeExecutionStatus::Skipped,
                output: None,
            },
        );
    }

    async fn record_node(&self, node: NodeExecution) {
        if let Err(e) = self.repo.create_node_execution(&node).await {
            tracing::warn!(
                execution_id = %node.execution_id,
                node_id = %node.node_id,
                error = %e,
                "failed to record node execution"
            );
        }
    }
}

/// Input for a node from its producers: none gives `{}`, one passes
/// its output through, several are wrapped under `__mergeInputs` keyed by
/// target handle (or `input_<source>`).
fn gather_inputs(
    incoming: &[&nodeflow_types::graph::WorkflowConnection],
    ctx: &ExecutionContext,
) -> Record {
    match incoming {
        [] => Record::new(),
        [single] => ctx.get_output(&single.source).cloned().unwrap_or_default(),
        many => {
            let mut inputs = Record::new();
            for conn in many {
                let output = ctx
                    .get_output(&conn.source)
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null);
                inputs.insert(conn.input_key(), output);
            }
            let mut wrapped = Record::new();
            wrapped.insert(MERGE_INPUTS_KEY.to_string(), Value::Object(inputs));
            wrapped
        }
    }
}

fn to_json(record: &Record) -> String {
    serde_json::to_string(record).unwrap_or_default()
}

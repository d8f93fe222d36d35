//! `nflow run`: execute a graph file against the local database.

use std::path::Path;

use anyhow::{bail, Context, Result};
use console::style;
use serde_json::Value;
use uuid::Uuid;

use nodeflow_core::repository::ExecutionRepository;
use nodeflow_types::execution::DEFAULT_TRIGGER_TYPE;
use nodeflow_types::graph::{Record, WorkflowGraph};

use super::history::{print_node_table, print_summary};
use crate::state::AppState;

pub async fn run_graph(
    state: &AppState,
    file: &Path,
    payload: Option<&str>,
    workflow_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let graph = parse_graph(&raw)
        .with_context(|| format!("Invalid workflow graph in {}", file.display()))?;
    let trigger_data = parse_payload(payload)?;
    let workflow_id = match workflow_id {
        Some(id) => id
            .parse::<Uuid>()
            .with_context(|| format!("Invalid workflow ID: '{id}'"))?,
        None => Uuid::now_v7(),
    };

    let execution_id = Uuid::now_v7();
    let outcome = state
        .engine
        .execute(
            execution_id,
            workflow_id,
            &graph,
            trigger_data,
            DEFAULT_TRIGGER_TYPE,
        )
        .await;

    let nodes = state
        .execution_repo
        .list_node_executions(&execution_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list node executions: {e}"))?;

    if json {
        let out = serde_json::json!({
            "executionId": execution_id,
            "status": outcome.status,
            "output": outcome.output,
            "error": outcome.error,
            "nodeExecutions": nodes,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        if let Some(execution) = state
            .execution_repo
            .get_execution(&execution_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load execution: {e}"))?
        {
            print_summary(&execution);
        }
        print_node_table(&nodes);

        if let Some(ref output) = outcome.output {
            println!("  {}", style("Output").bold());
            for line in serde_json::to_string_pretty(output)?.lines() {
                println!("  {line}");
            }
            println!();
        }
    }

    if !outcome.is_success() {
        bail!(
            "{}",
            outcome.error.unwrap_or_else(|| "execution failed".to_string())
        );
    }
    Ok(())
}

/// Accept either a bare graph or a stored workflow with a `graph` field.
fn parse_graph(raw: &str) -> Result<WorkflowGraph> {
    let mut value: Value = serde_json::from_str(raw)?;
    if let Some(graph) = value.get_mut("graph").filter(|g| g.is_object()) {
        value = graph.take();
    }
    Ok(serde_json::from_value(value)?)
}

fn parse_payload(payload: Option<&str>) -> Result<Record> {
    let Some(raw) = payload else {
        return Ok(Record::new());
    };
    match serde_json::from_str::<Value>(raw).context("Invalid JSON payload")? {
        Value::Object(record) => Ok(record),
        other => bail!("Payload must be a JSON object, got: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_wrapped_graphs() {
        let bare = r#"{"nodes": [{"id": "t", "type": "webhookTrigger"}], "connections": []}"#;
        assert_eq!(parse_graph(bare).unwrap().nodes.len(), 1);

        let wrapped = format!(r#"{{"name": "demo", "graph": {bare}}}"#);
        assert_eq!(parse_graph(&wrapped).unwrap().nodes[0].id, "t");
    }

    #[test]
    fn payload_must_be_an_object() {
        assert!(parse_payload(None).unwrap().is_empty());
        assert_eq!(parse_payload(Some(r#"{"a": 1}"#)).unwrap()["a"], 1);
        assert!(parse_payload(Some("[1, 2]")).is_err());
        assert!(parse_payload(Some("not json")).is_err());
    }
}

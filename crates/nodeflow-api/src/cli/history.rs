//! `nflow history`: node executions of a recorded run.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use uuid::Uuid;

use nodeflow_core::repository::ExecutionRepository;
use nodeflow_types::execution::{Execution, ExecutionStatus, NodeExecution};

use super::node_status_cell;
use crate::state::AppState;

pub async fn show_history(state: &AppState, execution_id: &str, json: bool) -> Result<()> {
    let id: Uuid = execution_id
        .parse()
        .with_context(|| format!("Invalid execution ID: '{execution_id}'"))?;

    let execution = state
        .execution_repo
        .get_execution(&id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load execution: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("Execution '{execution_id}' not found"))?;
    let nodes = state
        .execution_repo
        .list_node_executions(&id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list node executions: {e}"))?;

    if json {
        let out = serde_json::json!({
            "execution": execution,
            "nodeExecutions": nodes,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_summary(&execution);
    print_node_table(&nodes);
    Ok(())
}

pub(crate) fn print_summary(execution: &Execution) {
    println!();
    println!(
        "  {} {}",
        style("Execution").bold(),
        style(execution.id).cyan()
    );
    println!("  Workflow: {}", execution.workflow_id);
    let status = execution.status.as_str();
    let status = match execution.status {
        ExecutionStatus::Success => style(status).green(),
        ExecutionStatus::Error => style(status).red(),
        ExecutionStatus::Running => style(status).blue(),
    };
    println!("  Status: {status}");
    println!("  Trigger: {}", execution.trigger_type);
    println!(
        "  Started: {}",
        execution.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(finished) = execution.finished_at {
        let elapsed = finished - execution.started_at;
        println!("  Duration: {} ms", elapsed.num_milliseconds());
    }
    if let Some(ref err) = execution.error_message {
        println!("  Error: {}", style(err).red());
    }
}

pub(crate) fn print_node_table(nodes: &[NodeExecution]) {
    println!();
    if nodes.is_empty() {
        println!("  No node executions recorded.");
        println!();
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Status"),
            Cell::new("Started"),
            Cell::new("Error"),
        ]);

    for n in nodes {
        let error = n
            .error_message
            .as_ref()
            .map(|e| e.chars().take(60).collect::<String>())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&n.node_id),
            Cell::new(&n.node_type),
            node_status_cell(n.status),
            Cell::new(n.started_at.format("%H:%M:%S%.3f").to_string()),
            Cell::new(error),
        ]);
    }

    println!("{table}");
    println!();
}

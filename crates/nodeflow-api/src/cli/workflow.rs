//! `nflow workflows`: list stored workflows.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use nodeflow_core::repository::WorkflowRepository;

use super::short_id;
use crate::state::AppState;

pub async fn list_workflows(state: &AppState, json: bool) -> Result<()> {
    let workflows = state
        .workflow_repo
        .list_workflows()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list workflows: {e}"))?;

    if json {
        let out: Vec<_> = workflows
            .iter()
            .map(|w| {
                serde_json::json!({
                    "id": w.id.to_string(),
                    "name": w.name,
                    "nodes": w.graph.nodes.len(),
                    "is_active": w.is_active,
                    "updated_at": w.updated_at.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows stored.");
        println!(
            "  Create one with: {}",
            style("POST /api/v1/workflows").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Nodes"),
            Cell::new("Active"),
            Cell::new("Updated"),
        ]);

    for w in &workflows {
        let active = if w.is_active {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(short_id(&w.id)),
            Cell::new(&w.name),
            Cell::new(w.graph.nodes.len()),
            active,
            Cell::new(w.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

//! Execution history handlers.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use nodeflow_core::repository::ExecutionRepository;
use nodeflow_types::execution::NodeExecution;

use super::parse_id;
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// A node record with its input/output snapshots decoded back to JSON.
fn node_json(node: NodeExecution) -> Value {
    let input = decode(node.input_data.as_deref());
    let output = decode(node.output_data.as_deref());
    let mut value = serde_json::to_value(&node).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("input_data".to_string(), input);
        map.insert("output_data".to_string(), output);
    }
    value
}

/// Parse stored JSON text; unparseable text is returned as a string.
fn decode(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Null,
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
    }
}

/// GET /api/v1/executions/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let id = parse_id(&id)?;
    let execution = state
        .execution_repo
        .get_execution(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Execution not found".to_string()))?;
    let nodes = state.execution_repo.list_node_executions(&id).await?;

    let mut data = serde_json::to_value(&execution)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if let Value::Object(map) = &mut data {
        let nodes = nodes.into_iter().map(node_json).collect();
        map.insert("nodeExecutions".to_string(), Value::Array(nodes));
    }
    Ok(Json(ApiResponse::success(data, start)))
}

/// DELETE /api/v1/executions/{id}
pub async fn delete_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    if !state.execution_repo.delete_execution(&id).await? {
        return Err(AppError::NotFound("Execution not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_snapshots() {
        assert_eq!(decode(None), Value::Null);
        assert_eq!(decode(Some(r#"{"a":1}"#)), serde_json::json!({"a": 1}));
        assert_eq!(decode(Some("not json")), Value::String("not json".into()));
    }
}

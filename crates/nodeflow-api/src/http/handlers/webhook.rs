//! Webhook receiver.
//!
//! `ANY /webhooks/{workflow_id}/{*path}` runs an active workflow with the
//! incoming request as trigger data and waits for the run to finish. The
//! response status comes from the workflow's `webhookTrigger` node
//! (`responseCode`, default 200) and the body is
//! `{"executionId": ..., "data": <final output or null>}`.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use nodeflow_core::repository::WorkflowRepository;
use nodeflow_types::graph::{Record, WorkflowGraph};

use super::parse_id;
use crate::http::error::AppError;
use crate::state::AppState;

/// Trigger node type whose config carries the response status.
const WEBHOOK_TRIGGER: &str = "webhookTrigger";

/// Trigger type recorded on webhook-started executions.
const WEBHOOK_TRIGGER_TYPE: &str = "webhook";

/// ANY /webhooks/{workflow_id}/{*path}
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path((workflow_id, path)): Path<(String, String)>,
    Query(query): Query<BTreeMap<String, String>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let workflow_id = parse_id(&workflow_id)?;
    let workflow = state
        .workflow_repo
        .get_workflow(&workflow_id)
        .await?
        .filter(|w| w.is_active)
        .ok_or_else(|| AppError::NotFound("Workflow not found or inactive".to_string()))?;

    let trigger_data = trigger_record(&method, &headers, &body, query, &path);

    tracing::info!(
        workflow_id = %workflow.id,
        method = %method,
        path = %path,
        "webhook triggering workflow execution"
    );

    let execution_id = Uuid::now_v7();
    let outcome = state
        .engine
        .execute(
            execution_id,
            workflow.id,
            &workflow.graph,
            trigger_data,
            WEBHOOK_TRIGGER_TYPE,
        )
        .await;

    let data = outcome.output.map(Value::Object).unwrap_or(Value::Null);
    Ok((
        response_status(&workflow.graph),
        Json(json!({ "executionId": execution_id, "data": data })),
    ))
}

/// Build the trigger payload: `{method, headers, body, query, path}`.
///
/// A JSON body is embedded as JSON, any other non-empty body as a string,
/// and an empty body as `{}`.
fn trigger_record(
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
    query: BTreeMap<String, String>,
    path: &str,
) -> Record {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Record::new())
    } else {
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
    };

    let query: serde_json::Map<String, Value> = query
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    let mut record = Record::new();
    record.insert("method".into(), Value::String(method.as_str().to_string()));
    record.insert("headers".into(), Value::Object(headers));
    record.insert("body".into(), body);
    record.insert("query".into(), Value::Object(query));
    record.insert("path".into(), Value::String(path.to_string()));
    record
}

/// Status configured on the first `webhookTrigger` node, or 200.
fn response_status(graph: &WorkflowGraph) -> StatusCode {
    graph
        .nodes
        .iter()
        .find(|n| n.node_type == WEBHOOK_TRIGGER)
        .and_then(|n| n.data.config.get("responseCode"))
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK)
}

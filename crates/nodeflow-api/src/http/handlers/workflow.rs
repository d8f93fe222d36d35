//! Workflow CRUD and execution handlers for the REST API.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use nodeflow_core::repository::{ExecutionRepository, WorkflowRepository};
use nodeflow_types::execution::{Execution, DEFAULT_TRIGGER_TYPE};
use nodeflow_types::graph::Record;
use nodeflow_types::workflow::{StoredWorkflow, WorkflowPatch};

use super::parse_id;
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateWorkflowRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default, rename = "inputData")]
    pub input_data: Option<Record>,
}

/// Query parameters for listing executions.
#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<StoredWorkflow>>>, AppError> {
    let start = Instant::now();
    let workflows = state.workflow_repo.list_workflows().await?;
    Ok(Json(ApiResponse::success(workflows, start)))
}

/// POST /api/v1/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StoredWorkflow>>), AppError> {
    let start = Instant::now();
    let workflow = StoredWorkflow::new(body.name, body.description);
    state.workflow_repo.create_workflow(&workflow).await?;

    tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "workflow created");
    let href = format!("/api/v1/workflows/{}", workflow.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(workflow, start).with_link("self", &href)),
    ))
}

/// GET /api/v1/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<StoredWorkflow>>, AppError> {
    let start = Instant::now();
    let workflow = find_workflow(&state, &id).await?;
    Ok(Json(ApiResponse::success(workflow, start)))
}

/// PUT /api/v1/workflows/{id}
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<WorkflowPatch>,
) -> Result<Json<ApiResponse<StoredWorkflow>>, AppError> {
    let start = Instant::now();
    let id = parse_id(&id)?;
    let workflow = state
        .workflow_repo
        .update_workflow(&id, &patch)
        .await
        .map_err(|e| match e {
            nodeflow_types::error::RepositoryError::NotFound => {
                AppError::NotFound("Workflow not found".to_string())
            }
            other => AppError::from(other),
        })?;
    Ok(Json(ApiResponse::success(workflow, start)))
}

/// DELETE /api/v1/workflows/{id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    if !state.workflow_repo.delete_workflow(&id).await? {
        return Err(AppError::NotFound("Workflow not found".to_string()));
    }
    tracing::info!(workflow_id = %id, "workflow deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows/{id}/execute
///
/// Starts a run in the background and answers 202 with its id. Progress is
/// available from the events socket and the execution endpoints.
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), AppError> {
    let start = Instant::now();
    let workflow = find_workflow(&state, &id).await?;

    let request: ExecuteRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ExecuteRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("invalid request body: {e}")))?
    };

    let execution_id = Uuid::now_v7();
    let engine = state.engine.clone();
    let input = request.input_data.unwrap_or_default();
    tokio::spawn(async move {
        let outcome = engine
            .execute(
                execution_id,
                workflow.id,
                &workflow.graph,
                input,
                DEFAULT_TRIGGER_TYPE,
            )
            .await;
        tracing::info!(
            execution_id = %execution_id,
            status = %outcome.status,
            "background execution finished"
        );
    });

    let href = format!("/api/v1/executions/{execution_id}");
    Ok((
        StatusCode::ACCEPTED,
        Json(
            ApiResponse::success(serde_json::json!({ "executionId": execution_id }), start)
                .with_link("execution", &href)
                .with_link("events", &format!("{href}/events")),
        ),
    ))
}

/// GET /api/v1/workflows/{id}/executions?limit=20&offset=0
pub async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<ApiResponse<Vec<Execution>>>, AppError> {
    let start = Instant::now();
    let id = parse_id(&id)?;
    let limit = if query.limit > 0 { query.limit } else { default_limit() };
    let offset = query.offset.max(0);

    let executions = state
        .execution_repo
        .list_executions(&id, limit, offset)
        .await?;
    Ok(Json(ApiResponse::success(executions, start)))
}

async fn find_workflow(state: &AppState, id: &str) -> Result<StoredWorkflow, AppError> {
    let id = parse_id(id)?;
    state
        .workflow_repo
        .get_workflow(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Workflow not found".to_string()))
}

//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `nodeflow-core`. The graph is stored
//! as a JSON blob; metadata columns are plain.

use chrono::Utc;
use nodeflow_core::repository::WorkflowRepository;
use nodeflow_types::error::RepositoryError;
use nodeflow_types::graph::WorkflowGraph;
use nodeflow_types::workflow::{StoredWorkflow, WorkflowPatch};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid, query_error};

/// SQLite-backed implementation of `WorkflowRepository`.
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct WorkflowRow {
    id: String,
    name: String,
    description: String,
    graph: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            graph: row.try_get("graph")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_workflow(self) -> Result<StoredWorkflow, RepositoryError> {
        let graph: WorkflowGraph = serde_json::from_str(&self.graph)
            .map_err(|e| RepositoryError::Query(format!("invalid workflow graph JSON: {e}")))?;

        Ok(StoredWorkflow {
            id: parse_uuid(&self.id)?,
            name: self.name,
            description: self.description,
            graph,
            is_active: self.is_active,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn graph_json(graph: &WorkflowGraph) -> Result<String, RepositoryError> {
    serde_json::to_string(graph)
        .map_err(|e| RepositoryError::Query(format!("serialize graph: {e}")))
}

// ---------------------------------------------------------------------------
// WorkflowRepository impl
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn create_workflow(&self, workflow: &StoredWorkflow) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflows (id, name, description, graph, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(graph_json(&workflow.graph)?)
        .bind(workflow.is_active)
        .bind(format_datetime(&workflow.created_at))
        .bind(format_datetime(&workflow.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                RepositoryError::Conflict(format!("workflow {} already exists", workflow.id))
            } else {
                query_error(e)
            }
        })?;

        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<StoredWorkflow>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = WorkflowRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_workflow()?))
            }
            None => Ok(None),
        }
    }

    async fn list_workflows(&self) -> Result<Vec<StoredWorkflow>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM workflows ORDER BY updated_at DESC, rowid DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = WorkflowRow::from_row(row).map_err(query_error)?;
            workflows.push(r.into_workflow()?);
        }
        Ok(workflows)
    }

    async fn update_workflow(
        &self,
        id: &Uuid,
        patch: &WorkflowPatch,
    ) -> Result<StoredWorkflow, RepositoryError> {
        // Read through the writer so the read-modify-write is serialized.
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_error)?
            .ok_or(RepositoryError::NotFound)?;
        let mut workflow = WorkflowRow::from_row(&row)
            .map_err(query_error)?
            .into_workflow()?;

        if let Some(name) = &patch.name {
            workflow.name = name.clone();
        }
        if let Some(description) = &patch.description {
            workflow.description = description.clone();
        }
        if let Some(graph) = &patch.graph {
            workflow.graph = graph.clone();
        }
        if let Some(is_active) = patch.is_active {
            workflow.is_active = is_active;
        }
        workflow.updated_at = Utc::now();

        sqlx::query(
            "UPDATE workflows SET name = ?, description = ?, graph = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(graph_json(&workflow.graph)?)
        .bind(workflow.is_active)
        .bind(format_datetime(&workflow.updated_at))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(workflow)
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }
}

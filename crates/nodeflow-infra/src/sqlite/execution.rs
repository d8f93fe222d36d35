//! SQLite execution history repository.
//!
//! Implements `ExecutionRepository` from `nodeflow-core`. Node input and
//! output snapshots are stored as the JSON text the engine produced.

use nodeflow_core::repository::ExecutionRepository;
use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::{
    Execution, ExecutionStatus, ExecutionUpdate, NodeExecution, NodeExecutionStatus,
};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid, query_error};

/// SQLite-backed implementation of `ExecutionRepository`.
pub struct SqliteExecutionRepository {
    pool: DatabasePool,
}

impl SqliteExecutionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct ExecutionRow {
    id: String,
    workflow_id: String,
    status: String,
    started_at: String,
    finished_at: Option<String>,
    error_message: Option<String>,
    trigger_type: String,
    created_at: String,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            status: row.try_get("status")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            error_message: row.try_get("error_message")?,
            trigger_type: row.try_get("trigger_type")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_execution(self) -> Result<Execution, RepositoryError> {
        let status: ExecutionStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Execution {
            id: parse_uuid(&self.id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            status,
            started_at: parse_datetime(&self.started_at)?,
            finished_at: self.finished_at.as_deref().map(parse_datetime).transpose()?,
            error_message: self.error_message,
            trigger_type: self.trigger_type,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct NodeExecutionRow {
    id: String,
    execution_id: String,
    node_id: String,
    node_type: String,
    status: String,
    input_data: Option<String>,
    output_data: Option<String>,
    error_message: Option<String>,
    started_at: String,
    finished_at: String,
}

impl NodeExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            execution_id: row.try_get("execution_id")?,
            node_id: row.try_get("node_id")?,
            node_type: row.try_get("node_type")?,
            status: row.try_get("status")?,
            input_data: row.try_get("input_data")?,
            output_data: row.try_get("output_data")?,
            error_message: row.try_get("error_message")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
        })
    }

    fn into_node_execution(self) -> Result<NodeExecution, RepositoryError> {
        let status: NodeExecutionStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(NodeExecution {
            id: parse_uuid(&self.id)?,
            execution_id: parse_uuid(&self.execution_id)?,
            node_id: self.node_id,
            node_type: self.node_type,
            status,
            input_data: self.input_data,
            output_data: self.output_data,
            error_message: self.error_message,
            started_at: parse_datetime(&self.started_at)?,
            finished_at: parse_datetime(&self.finished_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ExecutionRepository impl
// ---------------------------------------------------------------------------

impl ExecutionRepository for SqliteExecutionRepository {
    async fn create_execution(&self, execution: &Execution) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO executions
               (id, workflow_id, status, started_at, finished_at, error_message, trigger_type, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(execution.workflow_id.to_string())
        .bind(execution.status.as_str())
        .bind(format_datetime(&execution.started_at))
        .bind(execution.finished_at.as_ref().map(format_datetime))
        .bind(&execution.error_message)
        .bind(&execution.trigger_type)
        .bind(format_datetime(&execution.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn update_execution(
        &self,
        id: &Uuid,
        update: &ExecutionUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE executions SET status = ?, finished_at = ?, error_message = ? WHERE id = ?",
        )
        .bind(update.status.as_str())
        .bind(update.finished_at.as_ref().map(format_datetime))
        .bind(&update.error_message)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_node_execution(&self, node: &NodeExecution) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO node_executions
               (id, execution_id, node_id, node_type, status, input_data, output_data,
                error_message, started_at, finished_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(node.id.to_string())
        .bind(node.execution_id.to_string())
        .bind(&node.node_id)
        .bind(&node.node_type)
        .bind(node.status.as_str())
        .bind(&node.input_data)
        .bind(&node.output_data)
        .bind(&node.error_message)
        .bind(format_datetime(&node.started_at))
        .bind(format_datetime(&node.finished_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<Execution>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = ExecutionRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_execution()?))
            }
            None => Ok(None),
        }
    }

    async fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Execution>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM executions WHERE workflow_id = ? ORDER BY started_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(workflow_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut executions = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ExecutionRow::from_row(row).map_err(query_error)?;
            executions.push(r.into_execution()?);
        }
        Ok(executions)
    }

    async fn list_node_executions(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<NodeExecution>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM node_executions WHERE execution_id = ? ORDER BY started_at ASC, rowid ASC",
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = NodeExecutionRow::from_row(row).map_err(query_error)?;
            nodes.push(r.into_node_execution()?);
        }
        Ok(nodes)
    }

    async fn delete_execution(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM executions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }
}

//! Execution repository trait definition.
//!
//! The engine writes through the first three methods while a run is in
//! progress; the rest serve history queries from the CLI and HTTP layer.

use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::{Execution, ExecutionUpdate, NodeExecution};
use uuid::Uuid;

/// Repository trait for execution history.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ExecutionRepository: Send + Sync {
    /// Insert a new execution (normally in `running` state).
    fn create_execution(
        &self,
        execution: &Execution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Apply a terminal status transition.
    fn update_execution(
        &self,
        id: &Uuid,
        update: &ExecutionUpdate,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert one node execution record.
    fn create_node_execution(
        &self,
        node: &NodeExecution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an execution by id.
    fn get_execution(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Execution>, RepositoryError>> + Send;

    /// List a workflow's executions, newest first.
    fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Execution>, RepositoryError>> + Send;

    /// Node executions of a run in the order they were recorded.
    fn list_node_executions(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<NodeExecution>, RepositoryError>> + Send;

    /// Delete an execution and its node executions. Returns `true` if it existed.
    fn delete_execution(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

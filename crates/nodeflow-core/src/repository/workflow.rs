//! Workflow repository trait definition.

use nodeflow_types::error::RepositoryError;
use nodeflow_types::workflow::{StoredWorkflow, WorkflowPatch};
use uuid::Uuid;

/// Repository trait for saved workflows.
pub trait WorkflowRepository: Send + Sync {
    /// Insert a new workflow.
    fn create_workflow(
        &self,
        workflow: &StoredWorkflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a workflow by id.
    fn get_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<StoredWorkflow>, RepositoryError>> + Send;

    /// All workflows, most recently updated first.
    fn list_workflows(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<StoredWorkflow>, RepositoryError>> + Send;

    /// Apply a partial update and bump `updated_at`.
    ///
    /// Returns `RepositoryError::NotFound` if the workflow does not exist.
    fn update_workflow(
        &self,
        id: &Uuid,
        patch: &WorkflowPatch,
    ) -> impl std::future::Future<Output = Result<StoredWorkflow, RepositoryError>> + Send;

    /// Delete a workflow by id. Returns `true` if it existed.
    fn delete_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

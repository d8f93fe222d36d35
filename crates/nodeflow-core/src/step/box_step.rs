//! BoxStepExecutor -- object-safe dynamic dispatch wrapper for StepExecutor.
//!
//! 1. `StepExecutorDyn` mirrors `StepExecutor` with a boxed future
//! 2. Blanket impl of `StepExecutorDyn` for every `T: StepExecutor`
//! 3. `BoxStepExecutor` wraps `Box<dyn StepExecutorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use nodeflow_types::graph::Record;

use crate::context::ExecutionContext;

use super::{StepError, StepExecutor, StepResult};

/// Object-safe version of [`StepExecutor`] with a boxed future.
pub trait StepExecutorDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        config: &'a Record,
        input: &'a Record,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<StepResult, StepError>> + Send + 'a>>;

    fn routes_by_branch(&self) -> bool;

    fn selects(&self, branch: &str, source_handle: &str) -> bool;
}

impl<T: StepExecutor> StepExecutorDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        config: &'a Record,
        input: &'a Record,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<StepResult, StepError>> + Send + 'a>> {
        Box::pin(self.execute(config, input, ctx))
    }

    fn routes_by_branch(&self) -> bool {
        StepExecutor::routes_by_branch(self)
    }

    fn selects(&self, branch: &str, source_handle: &str) -> bool {
        StepExecutor::selects(self, branch, source_handle)
    }
}

/// Type-erased step executor as stored in the registry.
pub struct BoxStepExecutor {
    inner: Box<dyn StepExecutorDyn>,
}

impl BoxStepExecutor {
    pub fn new<T: StepExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Box::new(executor),
        }
    }

    pub async fn execute(
        &self,
        config: &Record,
        input: &Record,
        ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        self.inner.execute_boxed(config, input, ctx).await
    }

    pub fn routes_by_branch(&self) -> bool {
        self.inner.routes_by_branch()
    }

    pub fn selects(&self, branch: &str, source_handle: &str) -> bool {
        self.inner.selects(branch, source_handle)
    }
}

impl std::fmt::Debug for BoxStepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxStepExecutor")
            .field("routes_by_branch", &self.routes_by_branch())
            .finish()
    }
}

//! Application state wiring storage, transports and the engine together.
//!
//! AppState holds the concrete instances used by both CLI commands and REST
//! handlers. The engine is generic over its repository; AppState pins it to
//! the SQLite implementation.

use std::path::PathBuf;
use std::sync::Arc;

use nodeflow_core::engine::ExecutionEngine;
use nodeflow_core::event::EventBus;
use nodeflow_core::step::registry::StepRegistry;
use nodeflow_core::transport::{ChatTransport, HttpTransport};
use nodeflow_infra::config::{load_global_config, resolve_data_dir};
use nodeflow_infra::http::ReqwestHttpTransport;
use nodeflow_infra::llm::ProviderChatTransport;
use nodeflow_infra::sqlite::execution::SqliteExecutionRepository;
use nodeflow_infra::sqlite::pool::{database_url, DatabasePool};
use nodeflow_infra::sqlite::workflow::SqliteWorkflowRepository;
use nodeflow_types::config::GlobalConfig;

/// Engine pinned to SQLite execution history.
pub type ConcreteEngine = ExecutionEngine<SqliteExecutionRepository>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub workflow_repo: Arc<SqliteWorkflowRepository>,
    pub execution_repo: Arc<SqliteExecutionRepository>,
    pub engine: Arc<ConcreteEngine>,
    pub event_bus: EventBus,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load config, open the database and wire
    /// the engine with the network transports.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let http: Arc<dyn HttpTransport> = Arc::new(ReqwestHttpTransport::new(&config.http));
        let chat: Arc<dyn ChatTransport> = Arc::new(ProviderChatTransport::new(&config.llm));

        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");
        Ok(Self::from_parts(db_pool, config, data_dir, http, chat))
    }

    /// Wire state from already-opened parts.
    pub fn from_parts(
        db_pool: DatabasePool,
        config: GlobalConfig,
        data_dir: PathBuf,
        http: Arc<dyn HttpTransport>,
        chat: Arc<dyn ChatTransport>,
    ) -> Self {
        let event_bus = EventBus::new(config.engine.event_capacity);
        let execution_repo = Arc::new(SqliteExecutionRepository::new(db_pool.clone()));
        let registry = Arc::new(StepRegistry::builtin(http, chat));

        let engine = ExecutionEngine::new(
            execution_repo.clone(),
            event_bus.clone(),
            registry,
            config.engine.clone(),
        );

        Self {
            workflow_repo: Arc::new(SqliteWorkflowRepository::new(db_pool)),
            execution_repo,
            engine: Arc::new(engine),
            event_bus,
            config: Arc::new(config),
            data_dir,
        }
    }
}

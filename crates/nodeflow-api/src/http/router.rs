//! Axum router configuration with middleware.
//!
//! REST routes live under `/api/v1/`. Webhooks are mounted at
//! `/webhooks/{workflow_id}/{*path}` and accept any method.
//! Middleware: CORS, tracing.

use axum::routing::{any, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Workflow CRUD
        .route(
            "/workflows",
            get(handlers::workflow::list_workflows).post(handlers::workflow::create_workflow),
        )
        .route(
            "/workflows/{id}",
            get(handlers::workflow::get_workflow)
                .put(handlers::workflow::update_workflow)
                .delete(handlers::workflow::delete_workflow),
        )
        // Runs
        .route(
            "/workflows/{id}/execute",
            post(handlers::workflow::execute_workflow),
        )
        .route(
            "/workflows/{id}/executions",
            get(handlers::workflow::list_executions),
        )
        // Execution history
        .route(
            "/executions/{id}",
            get(handlers::execution::get_execution).delete(handlers::execution::delete_execution),
        )
        .route(
            "/executions/{id}/events",
            get(handlers::events::execution_events),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route(
            "/webhooks/{workflow_id}/{*path}",
            any(handlers::webhook::receive_webhook),
        )
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

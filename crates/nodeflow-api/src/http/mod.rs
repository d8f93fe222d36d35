//! HTTP/REST API layer for nodeflow.
//!
//! Axum-based REST API at `/api/v1/`, webhook receivers at `/webhooks/`,
//! envelope response format and CORS support.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;

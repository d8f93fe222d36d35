//! REST API handler modules.

pub mod events;
pub mod execution;
pub mod webhook;
pub mod workflow;

use uuid::Uuid;

use crate::http::error::AppError;

/// Parse a path segment as a UUID.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("invalid id: {raw}")))
}

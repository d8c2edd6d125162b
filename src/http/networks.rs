//! Network CRUD handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::db::Network;
use crate::irc::NetworkWithHealth;

use super::{ApiError, AppState, parse_json};

/// GET /api/irc - persisted networks joined with live handler health.
pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<NetworkWithHealth>>, ApiError> {
    Ok(Json(state.supervisor.get_with_health().await?))
}

/// POST /api/irc
pub async fn store(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Network>, ApiError> {
    let network: Network = parse_json(&body)?;
    let stored = state.supervisor.store_network(network).await?;
    Ok(Json(stored))
}

/// PUT /api/irc/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let mut network: Network = parse_json(&body)?;
    network.id = id;
    state.supervisor.update_network(network).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/irc/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.supervisor.delete_network(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/irc/:id/restart
pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.supervisor.restart_network(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

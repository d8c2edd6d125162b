//! Filter CRUD handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::db::Filter;

use super::{ApiError, AppState, parse_json};

/// GET /api/filters
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Filter>>, ApiError> {
    Ok(Json(state.db.filters().list().await?))
}

/// GET /api/filters/:id
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Filter>, ApiError> {
    Ok(Json(state.db.filters().get(id).await?))
}

/// POST /api/filters
pub async fn store(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Filter>, ApiError> {
    let filter: Filter = parse_json(&body)?;
    if filter.name.trim().is_empty() {
        return Err(ApiError::BadRequest("filter name must not be empty".into()));
    }
    let stored = state.db.filters().store(&filter).await?;
    Ok(Json(stored))
}

/// PUT /api/filters/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let mut filter: Filter = parse_json(&body)?;
    filter.id = id;
    state.db.filters().update(&filter).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/filters/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.filters().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Release query handlers.

use axum::Json;
use axum::extract::{Query, State};

use crate::db::{ReleaseQuery, ReleaseWithStatus};

use super::{ApiError, AppState};

/// GET /api/releases?offset=&limit=&indexer=&action_status=
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ReleaseQuery>,
) -> Result<Json<Vec<ReleaseWithStatus>>, ApiError> {
    Ok(Json(state.db.releases().query(&query).await?))
}

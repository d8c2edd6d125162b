//! HTTP control plane.
//!
//! Serves the operator API under the configured base URL: cookie-session
//! auth, network CRUD with live health, filter CRUD, release queries, and
//! the Prometheus metrics endpoint. The listener is plaintext; TLS
//! termination belongs to an upstream reverse proxy.

mod auth;
mod filters;
mod networks;
pub mod password;
mod releases;

pub use auth::SessionStore;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Router, middleware};
use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::config::Config;
use crate::db::{Database, DbError};
use crate::error::ServiceError;
use crate::irc::NetworkSupervisor;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub supervisor: Arc<NetworkSupervisor>,
    pub sessions: Arc<SessionStore>,
}

/// API error mapped onto a status code.
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Invalid(msg) | ServiceError::Conflict(msg) => ApiError::BadRequest(msg),
            ServiceError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ServiceError::Db(db) => db.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NetworkNotFound(_)
            | DbError::FilterNotFound(_)
            | DbError::ReleaseNotFound(_) => ApiError::NotFound(err.to_string()),
            DbError::Sqlx(_) => ApiError::Internal(err.to_string()),
        }
    }
}

/// Parse a JSON body, mapping malformed input to 400.
fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::BadRequest(format!("malformed body: {}", e)))
}

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Build the full router nested under the configured base URL.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/test", get(auth::test))
        .route("/irc", get(networks::list).post(networks::store))
        .route("/irc/:id", put(networks::update).delete(networks::delete))
        .route("/irc/:id/restart", post(networks::restart))
        .route("/filters", get(filters::list).post(filters::store))
        .route(
            "/filters/:id",
            get(filters::get_one).put(filters::update).delete(filters::delete),
        )
        .route("/releases", get(releases::list))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .merge(protected);

    let mut app = Router::new().nest("/api", api);
    if state.config.server.metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    let base = state.config.server.base_path();
    let app = app.with_state(state);
    if base.is_empty() {
        app
    } else {
        Router::new().nest(&base, app)
    }
}

/// Serve the API on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP API listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

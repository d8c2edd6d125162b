//! Cookie-based session authentication.
//!
//! Single-operator model: one username and argon2 hash from config, an
//! in-memory session store keyed by random tokens. The cookie is HttpOnly
//! and SameSite=Lax by default, upgraded to Secure + SameSite=Strict when
//! the request arrived over HTTPS via the reverse proxy.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ApiError, AppState, parse_json, password};

const SESSION_COOKIE: &str = "snatchd_session";

/// One authenticated session.
pub struct Session {
    pub username: String,
    pub created: DateTime<Utc>,
}

/// In-memory session store.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session and return its token.
    pub fn create(&self, username: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                created: Utc::now(),
            },
        );
        token
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    pub fn remove(&self, token: &str) {
        self.sessions.remove(token);
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// Extract the session token from the request's Cookie header.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Whether the original request was HTTPS, as reported by the proxy.
fn is_forwarded_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("https"))
}

fn session_cookie(token: &str, path: &str, secure: bool) -> String {
    if secure {
        format!(
            "{}={}; Path={}; HttpOnly; Secure; SameSite=Strict",
            SESSION_COOKIE, token, path
        )
    } else {
        format!(
            "{}={}; Path={}; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, token, path
        )
    }
}

fn clear_cookie(path: &str) -> String {
    format!(
        "{}=; Path={}; HttpOnly; Max-Age=0",
        SESSION_COOKIE, path
    )
}

fn with_cookie(status: StatusCode, cookie: &str) -> Response {
    let mut response = status.into_response();
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

/// Middleware: reject requests without a live session.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let authenticated = session_token(request.headers())
        .map(|token| state.sessions.contains(&token))
        .unwrap_or(false);

    if !authenticated {
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(request).await
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    let request: LoginRequest = parse_json(&body)?;

    if request.username != state.config.auth.username {
        warn!(username = %request.username, "login with unknown username");
        return Err(ApiError::Unauthorized);
    }

    let valid = password::verify_password(
        request.password,
        state.config.auth.password_hash.clone(),
    )
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        warn!(username = %request.username, "login with bad password");
        return Err(ApiError::Unauthorized);
    }

    let token = state.sessions.create(&request.username);
    let cookie = session_cookie(
        &token,
        &state.config.server.cookie_path(),
        is_forwarded_https(&headers),
    );

    info!(username = %request.username, "operator logged in");
    Ok(with_cookie(StatusCode::NO_CONTENT, &cookie))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.remove(&token);
        debug!("session cleared");
    }
    with_cookie(
        StatusCode::NO_CONTENT,
        &clear_cookie(&state.config.server.cookie_path()),
    )
}

/// GET /api/auth/test - 204 when the middleware let the request through.
pub async fn test() -> StatusCode {
    StatusCode::NO_CONTENT
}

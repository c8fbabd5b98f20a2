// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport (§6): session-cookie auth plus the JSON/SSE API surface.
//! Router shape and middleware style follow the teacher's `transport/mod.rs`
//! and `transport/auth.rs` (path-exempting middleware over shared state),
//! adapted from bearer tokens to a session cookie backed by `SessionStore`.

pub mod handlers;

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use centaurx_core::ids::{SessionToken, UserId};
use tower_http::cors::CorsLayer;

use crate::error::{ErrorBody, ErrorResponse};
use crate::state::AppState;

/// Paths that do not require a session cookie.
const EXEMPT_PATHS: &[&str] = &["/api/login"];

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/chpasswd", post(handlers::chpasswd))
        .route("/api/codexauth", post(handlers::codex_auth))
        .route("/api/me", get(handlers::me))
        .route("/api/tabs", get(handlers::list_tabs).post(handlers::create_tab))
        .route("/api/tabs/activate", post(handlers::activate_tab))
        .route("/api/prompt", post(handlers::send_prompt))
        .route("/api/buffer", get(handlers::get_buffer))
        .route("/api/system", get(handlers::get_system_buffer))
        .route("/api/history", get(handlers::get_history).post(handlers::append_history))
        .route("/api/stream", get(handlers::stream))
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The authenticated user for the current request, extracted from the
/// session the `auth_layer` middleware already validated.
#[derive(Clone)]
pub struct AuthedUser {
    pub user: UserId,
    pub token: SessionToken,
}

impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthedUser>().cloned().ok_or_else(|| {
            unauthorized_response("missing session")
        })
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse { error: ErrorBody { code: "AUTH_FAILED".to_string(), message: message.to_string() } };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Read `name=value` out of the `Cookie` header, matching the teacher's
/// direct-header-parsing style (no `axum-extra` cookie jar dependency).
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let pair = pair.trim();
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Build a `Set-Cookie` value for a freshly issued session.
pub fn session_cookie(state: &AppState, token: &SessionToken) -> String {
    format!(
        "{}={}; Path={}; HttpOnly; SameSite=Lax; Max-Age={}",
        state.config.http.session_cookie,
        token.as_str(),
        state.config.http.base_path,
        state.config.http.session_ttl_hours * 3600,
    )
}

/// Build a `Set-Cookie` value that clears the session cookie (logout).
pub fn expired_cookie(state: &AppState) -> String {
    format!(
        "{}=; Path={}; HttpOnly; SameSite=Lax; Max-Age=0",
        state.config.http.session_cookie, state.config.http.base_path,
    )
}

async fn auth_layer(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if EXEMPT_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let Some(raw_token) = read_cookie(req.headers(), &state.config.http.session_cookie) else {
        return unauthorized_response("no session cookie");
    };
    let token = SessionToken::from_raw(raw_token);
    let Some(user) = state.sessions.user_for(&token) else {
        return unauthorized_response("invalid or expired session");
    };

    req.extensions_mut().insert(AuthedUser { user, token });
    next.run(req).await
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

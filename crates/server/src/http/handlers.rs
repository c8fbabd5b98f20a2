// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers (§6): request/response structs plus thin translation into
//! `TabSessionService`/`SessionStore`/`AuthStore` calls, following the
//! teacher's `State<Arc<S>>` + `Json<Req>` + `impl IntoResponse` handler
//! shape.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use centaurx_core::event::StreamEventKind;
use centaurx_core::ids::TabId;
use centaurx_core::model::TabSnapshot;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt as _;

use crate::error::{ApiError, ApiResult};
use crate::http::{expired_cookie, read_cookie, session_cookie, AuthedUser};
use crate::state::AppState;

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

// -- /api/login / /api/logout ------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub totp: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
}

pub async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> impl IntoResponse {
    match state.auth.verify_login(&req.username, &req.password, &req.totp, now_unix()) {
        Ok(user) => {
            let token = state.sessions.create(user.clone());
            let cookie = match session_cookie(&state, &token).parse() {
                Ok(value) => value,
                Err(_) => return ApiError::from(centaurx_core::error::CoreError::internal("malformed session cookie")).into_response(),
            };
            let mut headers = HeaderMap::new();
            headers.insert(axum::http::header::SET_COOKIE, cookie);
            (StatusCode::OK, headers, Json(LoginResponse { username: user.as_str().to_string() })).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(raw) = read_cookie(&headers, &state.config.http.session_cookie) {
        state.sessions.logout(&centaurx_core::ids::SessionToken::from_raw(raw));
    }
    let cookie = match expired_cookie(&state).parse() {
        Ok(value) => value,
        Err(_) => return ApiError::from(centaurx_core::error::CoreError::internal("malformed session cookie")).into_response(),
    };
    let mut out = HeaderMap::new();
    out.insert(axum::http::header::SET_COOKIE, cookie);
    (StatusCode::OK, out).into_response()
}

// -- /api/chpasswd -------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChpasswdRequest {
    pub current_password: String,
    pub totp: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub async fn chpasswd(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Json(req): Json<ChpasswdRequest>,
) -> ApiResult<StatusCode> {
    if req.new_password != req.confirm_password {
        return Err(centaurx_core::error::CoreError::invalid_request("new_password and confirm_password do not match").into());
    }
    state.auth.change_password(user.user.as_str(), &req.current_password, &req.totp, &req.new_password, now_unix())?;
    Ok(StatusCode::OK)
}

// -- /api/codexauth -------------------------------------------------------

const CODEX_AUTH_MAX_BYTES: usize = 2 * 1024 * 1024;

pub async fn codex_auth(State(state): State<Arc<AppState>>, user: AuthedUser, body: axum::body::Bytes) -> ApiResult<StatusCode> {
    if body.len() > CODEX_AUTH_MAX_BYTES {
        return Err(centaurx_core::error::CoreError::invalid_request("payload exceeds 2 MiB").into());
    }
    state.service.save_codex_auth(&user.user, body.to_vec()).await?;
    Ok(StatusCode::OK)
}

// -- /api/me --------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub username: String,
    pub theme: String,
    pub full_command_output: bool,
}

pub async fn me(State(state): State<Arc<AppState>>, user: AuthedUser) -> Json<MeResponse> {
    let prefs = state.service.preferences(&user.user);
    Json(MeResponse { username: user.user.as_str().to_string(), theme: prefs.theme, full_command_output: prefs.full_command_output })
}

// -- /api/tabs --------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct TabsResponse {
    pub tabs: Vec<TabSnapshot>,
    pub active_tab: Option<String>,
    pub theme: String,
}

pub async fn list_tabs(State(state): State<Arc<AppState>>, user: AuthedUser) -> Json<TabsResponse> {
    let list = state.service.list_tabs(&user.user);
    Json(TabsResponse { tabs: list.tabs, active_tab: list.active_tab.map(|t| t.as_str().to_string()), theme: list.theme })
}

#[derive(Debug, Deserialize)]
pub struct CreateTabRequest {
    pub repo_name: String,
    #[serde(default)]
    pub create_repo: bool,
    #[serde(default)]
    pub model: Option<String>,
}

pub async fn create_tab(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Json(req): Json<CreateTabRequest>,
) -> ApiResult<Json<TabSnapshot>> {
    let snapshot = state.service.create_tab(&user.user, &req.repo_name, req.create_repo, req.model)?;
    Ok(Json(snapshot))
}

// -- /api/tabs/activate -------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ActivateTabRequest {
    pub tab_id: String,
}

pub async fn activate_tab(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Json(req): Json<ActivateTabRequest>,
) -> ApiResult<Json<TabSnapshot>> {
    let snapshot = state.service.activate_tab(&user.user, &TabId::from_raw(req.tab_id))?;
    Ok(Json(snapshot))
}

// -- /api/prompt ----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub tab_id: String,
    pub prompt: String,
}

pub async fn send_prompt(State(state): State<Arc<AppState>>, user: AuthedUser, Json(req): Json<PromptRequest>) -> ApiResult<StatusCode> {
    state.service.send_prompt(&user.user, &TabId::from_raw(req.tab_id), req.prompt).await?;
    Ok(StatusCode::OK)
}

// -- /api/buffer, /api/system, /api/history --------------------------------

#[derive(Debug, Deserialize)]
pub struct BufferQuery {
    pub tab_id: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn get_buffer(State(state): State<Arc<AppState>>, user: AuthedUser, Query(q): Query<BufferQuery>) -> ApiResult<Json<Vec<String>>> {
    let limit = q.limit.unwrap_or(state.config.http.initial_buffer_lines);
    let lines = state.service.get_buffer(&user.user, &TabId::from_raw(q.tab_id), 0, limit)?;
    Ok(Json(lines))
}

#[derive(Debug, Deserialize)]
pub struct SystemQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn get_system_buffer(State(state): State<Arc<AppState>>, user: AuthedUser, Query(q): Query<SystemQuery>) -> Json<Vec<String>> {
    let limit = q.limit.unwrap_or(state.config.http.initial_buffer_lines);
    Json(state.service.get_system_buffer(&user.user, limit))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub tab_id: String,
}

pub async fn get_history(State(state): State<Arc<AppState>>, user: AuthedUser, Query(q): Query<HistoryQuery>) -> ApiResult<Json<Vec<String>>> {
    let entries = state.service.get_history(&user.user, &TabId::from_raw(q.tab_id))?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct AppendHistoryRequest {
    pub tab_id: String,
    pub entry: String,
}

pub async fn append_history(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Json(req): Json<AppendHistoryRequest>,
) -> ApiResult<StatusCode> {
    state.service.append_history(&user.user, &TabId::from_raw(req.tab_id), &req.entry)?;
    Ok(StatusCode::OK)
}

// -- /api/stream (SSE) ------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub last_event_id: Option<u64>,
}

/// `GET /api/stream`: an initial snapshot (tabs + buffers + system + theme),
/// then retained history (optionally only the tail after `Last-Event-ID`),
/// then the live tail — on every subscribe, fresh connect or reconnect
/// alike (§4.5). Each event's SSE `id` carries the hub seq.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    headers: HeaderMap,
    Query(q): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_event_id = q.last_event_id.or_else(|| headers.get("last-event-id").and_then(|v| v.to_str().ok()).and_then(|v| v.parse().ok()));

    let centaurx_core::hub::Subscription { receiver, current_seq, history, .. } = state.hub.subscribe(&user.user);
    let snapshot = render_sse_event(&build_snapshot_event(&state, &user.user, current_seq, state.config.http.initial_buffer_lines));
    let backlog: Vec<Event> = match last_event_id {
        Some(after) => history.iter().filter(|e| e.seq > after).map(render_sse_event).collect(),
        None => history.iter().map(render_sse_event).collect(),
    };

    let live = tokio_stream::wrappers::ReceiverStream::new(receiver).map(|e| render_sse_event(&e));

    let events = stream::iter(std::iter::once(snapshot).chain(backlog)).chain(live).map(Ok);
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Assembles the "here's everything as of right now" event sent as the
/// first SSE message on every subscribe (§4.5). Not drawn from hub history
/// — it's a fresh read of current state, tagged with the hub seq the
/// subscription started from so a client can reason about where the
/// replay/live tail picks up.
pub(crate) fn build_snapshot_event(state: &AppState, user: &centaurx_core::ids::UserId, current_seq: u64, limit: usize) -> centaurx_core::event::StreamEvent {
    let list = state.service.list_tabs(user);
    let mut buffers = serde_json::Map::new();
    for tab in &list.tabs {
        let lines = state.service.get_buffer(user, &tab.id, 0, limit).unwrap_or_default();
        buffers.insert(tab.id.as_str().to_string(), serde_json::Value::from(lines));
    }
    let system = state.service.get_system_buffer(user, limit);
    let payload = serde_json::json!({
        "tabs": list.tabs,
        "active_tab": list.active_tab.as_ref().map(|t| t.as_str()),
        "theme": list.theme,
        "buffers": buffers,
        "system": system,
    });
    centaurx_core::event::StreamEvent { seq: current_seq, kind: StreamEventKind::Snapshot, payload, timestamp_ms: now_unix() * 1000 }
}

fn render_sse_event(event: &centaurx_core::event::StreamEvent) -> Event {
    let name = match event.kind {
        StreamEventKind::Snapshot => "snapshot",
        StreamEventKind::Output => "output",
        StreamEventKind::System => "system",
        StreamEventKind::Tab => "tab",
    };
    Event::default().id(event.seq.to_string()).event(name).json_data(&event.payload).unwrap_or_else(|_| Event::default().id(event.seq.to_string()))
}

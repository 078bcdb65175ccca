// Dashboard and admin API

use std::collections::HashMap;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use super::{ApiError, AppState};
use crate::auth::{SESSION_COOKIE, SESSION_TTL_SECS};
use crate::models::ClientView;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// Value of the `session` cookie, if the request carries one.
fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == SESSION_COOKIE && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

async fn is_authenticated(state: &AppState, headers: &HeaderMap) -> bool {
    match session_token(headers) {
        Some(token) => state.auth.is_valid(&token, chrono::Utc::now()).await,
        None => false,
    }
}

async fn require_session(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if is_authenticated(state, headers).await {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn success() -> Json<serde_json::Value> {
    Json(json!({ "status": "success" }))
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    username: String,
    password: String,
}

/// POST /api/login: sets the session cookie.
pub(super) async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = match state
        .auth
        .login(&req.username, &req.password, chrono::Utc::now())
        .await
    {
        Ok(t) => t,
        Err(e) => {
            tracing::info!(username = %req.username, "login rejected");
            return Err(e.into());
        }
    };
    // readable by the dashboard script, which checks it to toggle admin controls
    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE, token, SESSION_TTL_SECS
    );
    Ok(([(header::SET_COOKIE, cookie)], success()))
}

/// POST /api/logout: revokes the session and clears the cookie.
pub(super) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.auth.logout(&token).await;
    }
    let cookie = format!("{}=; Path=/; Max-Age=0; SameSite=Lax", SESSION_COOKIE);
    ([(header::SET_COOKIE, cookie)], success())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ChangePasswordRequest {
    username: String,
    old_password: String,
    new_password: String,
}

/// POST /api/change-password
pub(super) async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers).await?;
    state
        .auth
        .change_password(&req.username, &req.old_password, &req.new_password)
        .await?;
    tracing::info!(username = %req.username, "credentials changed");
    Ok(Json(json!({ "status": "success", "message": "settings saved" })))
}

/// GET /api/clients: ordered by display order; ids only for logged-in callers.
pub(super) async fn list_clients(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let reveal = is_authenticated(&state, &headers).await;
    let views: Vec<ClientView> = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|r| ClientView::from_record(r, reveal))
        .collect();
    Json(views)
}

#[derive(Debug, Deserialize)]
pub(super) struct AddClientRequest {
    name: String,
}

/// POST /api/clients/add
pub(super) async fn add_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddClientRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers).await?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("client name must be non-empty".into()));
    }
    let record = state.registry.register(name).await;
    state.persist().await?;
    Ok(Json(json!({ "status": "success", "id": record.id })))
}

#[derive(Debug, Deserialize)]
pub(super) struct DeleteClientRequest {
    id: String,
}

/// POST /api/clients/delete: also closes the client's live connection.
pub(super) async fn delete_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeleteClientRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers).await?;
    if state.registry.deregister(&req.id).await.is_some() {
        state.persist().await?;
    }
    Ok(success())
}

#[derive(Debug, Deserialize)]
pub(super) struct ReorderRequest {
    orders: HashMap<String, i64>,
}

/// POST /api/clients/reorder: unknown ids are ignored.
pub(super) async fn reorder_clients(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers).await?;
    let applied = state.registry.reorder(&req.orders).await;
    if applied < req.orders.len() {
        tracing::debug!(
            requested = req.orders.len(),
            applied,
            "reorder skipped unknown client ids"
        );
    }
    if applied > 0 {
        state.persist().await?;
    }
    Ok(success())
}

#[derive(Debug, Deserialize)]
pub(super) struct RenameRequest {
    id: String,
    name: String,
}

/// POST /api/clients/rename
pub(super) async fn rename_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RenameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers).await?;
    if req.id.is_empty() {
        return Err(ApiError::BadRequest("client id must be non-empty".into()));
    }
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("client name must be non-empty".into()));
    }
    state.registry.rename(&req.id, name).await?;
    state.persist().await?;
    Ok(success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_session_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_token(&headers), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}

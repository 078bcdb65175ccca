// HTTP + WebSocket routes

mod error;
mod http;
mod ws;

pub use error::ApiError;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use crate::auth::Auth;
use crate::config::AppConfig;
use crate::registry::ClientRegistry;
use crate::registry::store::ClientStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<ClientRegistry>,
    pub(crate) store: Arc<ClientStore>,
    pub(crate) auth: Arc<Auth>,
}

impl AppState {
    /// Persist the registry. A failed save is reported to the caller; the
    /// in-memory change it follows stays applied.
    pub(crate) async fn persist(&self) -> Result<(), ApiError> {
        self.store
            .persist(&self.registry)
            .await
            .map_err(|e| ApiError::Internal(format!("saving clients failed: {}", e)))
    }
}

pub fn app(
    registry: Arc<ClientRegistry>,
    store: Arc<ClientStore>,
    auth: Arc<Auth>,
    config: &AppConfig,
) -> Router {
    let state = AppState {
        registry,
        store,
        auth,
    };
    let assets = std::path::Path::new(&config.web.assets_dir);
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/login", post(http::login)) // POST /api/login
        .route("/api/logout", post(http::logout)) // POST /api/logout
        .route("/api/change-password", post(http::change_password)) // POST /api/change-password
        .route("/api/clients", get(http::list_clients)) // GET /api/clients
        .route("/api/clients/add", post(http::add_client)) // POST /api/clients/add
        .route("/api/clients/delete", post(http::delete_client)) // POST /api/clients/delete
        .route("/api/clients/reorder", post(http::reorder_clients)) // POST /api/clients/reorder
        .route("/api/clients/rename", post(http::rename_client)) // POST /api/clients/rename
        .route("/ws", get(ws::ws_client)) // WS /ws?id=<client id>
        .nest_service("/assets", ServeDir::new(assets))
        .route_service("/", ServeFile::new(assets.join("index.html")))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

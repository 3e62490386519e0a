use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::bridge::{BridgeHandle, Command, Response};
use crate::engine::Engine;
use crate::ingest::types::Item;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub bridge: BridgeHandle,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/command", post(command))
        .route("/projects", get(projects))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Bridge over HTTP. Command-level failures still answer 200 with
/// `{success:false}`; 503 means the bridge itself is gone.
async fn command(State(state): State<AppState>, Json(cmd): Json<Command>) -> (StatusCode, Json<Response>) {
    match state.bridge.request(cmd).await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => {
            tracing::error!(target: "api", error = %e, "bridge unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(Response::failure(e)))
        }
    }
}

async fn projects(State(state): State<AppState>) -> Result<Json<Vec<Item>>, (StatusCode, String)> {
    state
        .engine
        .projects()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

//! HTTP routes: websocket upgrade, health probe, and the metrics counter
//! endpoint.

use super::{connection, AppState};
use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router with CORS from the configured origins.
pub fn create_router(cors_origins: &str, cors_methods: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(build_cors(cors_origins, cors_methods))
        .layer(TraceLayer::new_for_http())
}

fn build_cors(origins: &str, methods: &str) -> CorsLayer {
    if origins.trim() == "*" {
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<_> = origins
        .split(',')
        .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
        .collect();
    if parsed_origins.is_empty() {
        tracing::warn!("No valid CORS origins configured, using permissive CORS");
        return CorsLayer::permissive();
    }

    let parsed_methods: Vec<axum::http::Method> = methods
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_headers(Any);
    if parsed_methods.is_empty() {
        layer.allow_methods(Any)
    } else {
        layer.allow_methods(parsed_methods)
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, state, addr))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rooms": state.store.len(),
        "connections": state.hub.connection_count(),
    }))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

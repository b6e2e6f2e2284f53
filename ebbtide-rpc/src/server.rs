//! HTTP server wiring for the RPC facade.
//!
//! One POST route, strict per-request pipeline: Basic-auth gate, session
//! handshake, body parse, dispatch. Handlers reach reconciler state only
//! through the handle, so they never race the poll loop.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tower_http::cors::CorsLayer;

use ebbtide_core::config::RpcConfig;
use ebbtide_core::reconciler::ReconcilerHandle;

use crate::methods::{RpcRequest, dispatch};
use crate::session::{SessionTokens, check_basic_auth, check_session};

/// Shared facade state.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: ReconcilerHandle,
    pub config: Arc<RpcConfig>,
    pub tokens: Arc<SessionTokens>,
}

/// Builds the facade router for the configured RPC path.
pub fn router(state: AppState) -> Router {
    let path = state.config.rpc_path.clone();
    Router::new()
        .route(&path, post(rpc_endpoint))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn rpc_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Err(response) = check_basic_auth(&state.config, &headers) {
        return response;
    }
    if let Err(response) = check_session(&state.tokens, &headers) {
        return response;
    }
    if !state.reconciler.is_running() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "503: reconciler unavailable",
        )
            .into_response();
    }

    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("400: invalid request body: {err}"))
                .into_response();
        }
    };

    tracing::debug!(method = %request.method, "rpc request");
    dispatch(request, &state).await
}

/// Binds the listener and serves the facade until the process exits.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - If the socket cannot be bound or the server fails
pub async fn run_server(
    config: RpcConfig,
    reconciler: ReconcilerHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr;
    let rpc_path = config.rpc_path.clone();

    let state = AppState {
        reconciler,
        config: Arc::new(config),
        tokens: Arc::new(SessionTokens::new()),
    };
    let app = router(state);

    tracing::info!(%bind_addr, rpc_path, "RPC facade listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

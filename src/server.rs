//! HTTP surface: the vehicle-status read endpoint and a liveness probe.
//!
//! Every response body is JSON regardless of what the upstream produced; a
//! malformed request yields a JSON error marker instead of a plain-text
//! rejection so downstream consumers never have to parse unexpected shapes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::GlobalConfig;
use crate::proxy::FetchCoordinator;
use crate::upstream::StatusQuery;
use crate::{AppError, Result};

/// Shared application state handed to every request handler.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Fetch coordinator owning the cache and the session manager.
    pub coordinator: Arc<FetchCoordinator>,
}

/// Handler for `GET /health` — returns 200 OK with a plain-text body.
///
/// Useful for probing liveness without driving an upstream fetch.
async fn health() -> &'static str {
    "ok"
}

/// Query parameters of the vehicle-status endpoint.
///
/// All fields are optional at the extractor level so that a missing `id`
/// can be answered with a JSON marker rather than axum's text rejection.
#[derive(Debug, Deserialize)]
struct StatusParams {
    id: Option<String>,
    imei: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Handler for `GET /vehicle-status`.
async fn vehicle_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> Json<Value> {
    let Some(vehicle_id) = params.id.filter(|id| !id.is_empty()) else {
        return Json(json!({ "error": "missing vehicle id" }));
    };

    let query = StatusQuery {
        vehicle_id,
        imei: params.imei.unwrap_or_default(),
        kind: params.kind.filter(|kind| !kind.is_empty()),
    };

    Json(state.coordinator.vehicle_status(&query).await)
}

/// Build the router: the read endpoint, the liveness probe, permissive CORS.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/vehicle-status", get(vehicle_status))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the proxy on `config.http_port` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Server` if the port cannot be bound or the server
/// fails while running.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Server(format!("failed to bind {bind}: {err}")))?;

    info!(%bind, "proxy server ready");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            ct.cancelled().await;
        })
        .await
        .map_err(|err| AppError::Server(format!("server error: {err}")))?;

    info!("proxy server shut down");
    Ok(())
}

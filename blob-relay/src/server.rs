//! Event Grid webhook.
//!
//! Event Grid posts batches of storage events to [`EVENTS_ROUTE`]. The handler answers
//! subscription validation handshakes, copies every blob created in the source container,
//! and replies 500 when a copy fails so that Event Grid redelivers the batch.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, warn};

use blob_relay_core::trigger::{interpret, parse_events};

use crate::relay::Relay;

/// Route name matches the function name the trigger was registered under.
pub const EVENTS_ROUTE: &str = "/api/processBlobUpload";

pub fn router(relay: Relay) -> Router {
    Router::new()
        .route(EVENTS_ROUTE, post(handle_events))
        .route("/health", get(health))
        .with_state(Arc::new(relay))
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_events(State(relay): State<Arc<Relay>>, body: Bytes) -> Response {
    let events = match parse_events(&body) {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "Rejecting malformed event delivery");
            return bad_request(e.to_string());
        }
    };

    let batch = match interpret(&events, &relay.settings().source_container) {
        Ok(batch) => batch,
        Err(e) => {
            warn!(error = %e, "Rejecting event delivery");
            return bad_request(e.to_string());
        }
    };

    if let Some(code) = batch.validation_code {
        info!("Answering subscription validation handshake");
        return Json(json!({ "validationResponse": code })).into_response();
    }

    match relay.copy_created(&batch.created).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!(blob = ?e.source_name(), error = %e, "Event delivery failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Serve the webhook until Ctrl-C.
pub async fn serve(relay: Relay, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, route = EVENTS_ROUTE, "Listening for Event Grid deliveries");
    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

//! HTTP front end over the control surface.
//!
//! Mirrors what the service exposes: health and lock status, a manual
//! trigger, the processed-ticket listing, schedule estimates, and an echo
//! endpoint for the downstream test runner's callbacks. No authentication
//! or rate limiting; this listens on an internal port.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::core::{PipelineService, TicketStore, TriggerDecision, TriggerSet};

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PipelineService>,
    pub store: Arc<TicketStore>,
    pub triggers: Arc<TriggerSet>,
    pub started_at: Instant,
}

/// Build the axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/trigger", post(trigger))
        .route("/tickets", get(tickets))
        .route("/status", get(status))
        .route("/webhook/test-runner", post(test_runner_webhook))
        .with_state(state)
}

/// Bind and serve until a shutdown signal arrives.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    info!(port, "HTTP front end listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "testsmith",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /": "This help message",
            "GET /health": "Health check and lock status",
            "POST /trigger": "Manual trigger for ticket processing",
            "GET /tickets": "List processed tickets",
            "GET /status": "Detailed service status",
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "lock": state.service.lock_status(),
    }))
}

async fn trigger(State(state): State<AppState>) -> Response {
    match state.service.clone().trigger_now() {
        TriggerDecision::Accepted => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "accepted", "timestamp": Utc::now() })),
        )
            .into_response(),
        TriggerDecision::AlreadyRunning => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "a pass is already running" })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct TicketsQuery {
    limit: Option<i64>,
}

async fn tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketsQuery>,
) -> Response {
    let limit = sanitize_limit(query.limit);
    match state.store.list_recent(limit) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "lock": state.service.lock_status(),
        "schedule": state.triggers.summary().await,
        "timestamp": Utc::now(),
    }))
}

async fn test_runner_webhook(Json(body): Json<Value>) -> Json<Value> {
    info!(payload = %body, "Test runner webhook received");
    Json(json!({ "received": true, "timestamp": Utc::now() }))
}

/// Clamp a caller-supplied limit into 1..=1000, defaulting to 50.
fn sanitize_limit(raw: Option<i64>) -> usize {
    match raw {
        Some(n) if n >= 1 => (n as usize).min(1000),
        _ => 50,
    }
}

//! Route handlers: each one deserializes a request, calls the matching
//! `Coordinator` method, and serializes the result. No business logic lives
//! here (§6c, §1 — the HTTP control surface is an external collaborator).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde::Serialize;

use crate::coordinator::{Coordinator, RunOutcome, StatsSnapshot};
use crate::reconciler::IntegrityReport;

/// Shared application state handed to every handler.
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

/// `{success, message, stats}` envelope (§7) returned by every run-triggering
/// control action.
#[derive(Debug, Serialize)]
struct RunEnvelope {
    success: bool,
    message: String,
    stats: StatsSnapshot,
}

async fn envelope_for(coordinator: &Coordinator, outcome: RunOutcome) -> RunEnvelope {
    RunEnvelope {
        success: outcome.success,
        message: outcome.message,
        stats: coordinator.stats().await,
    }
}

pub fn control_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/reset", post(reset_stats_handler))
        .route("/collections", get(collections_handler))
        .route("/collections/:name/schema", get(schema_handler))
        .route("/run", post(run_handler))
        .route("/run/full", post(run_full_handler))
        .route("/run/auth", post(run_auth_handler))
        .route("/recover", post(recover_handler))
        .route("/reconcile", post(reconcile_handler))
        .route("/events", get(events_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.coordinator.health_monitor().current().await)
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.coordinator.stats().await)
}

async fn reset_stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.coordinator.reset_stats().await {
        Ok(()) => (StatusCode::OK, Json(envelope_for(&state.coordinator, RunOutcome::reset_ok()).await)).into_response(),
        Err(err) => error_response(err.to_string()),
    }
}

async fn collections_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.coordinator.list_collections().await {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(err) => error_response(err.to_string()),
    }
}

async fn schema_handler(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> impl IntoResponse {
    Json(state.coordinator.schema_for(&name).await)
}

async fn run_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.coordinator.run_once().await;
    Json(envelope_for(&state.coordinator, outcome).await)
}

async fn run_full_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.coordinator.force_full().await;
    Json(envelope_for(&state.coordinator, outcome).await)
}

async fn run_auth_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.coordinator.force_auth().await;
    Json(envelope_for(&state.coordinator, outcome).await)
}

async fn recover_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.coordinator.recover().await;
    Json(envelope_for(&state.coordinator, outcome).await)
}

#[derive(Debug, Serialize)]
struct ReconcileResponse {
    success: bool,
    reports: Vec<IntegrityReport>,
}

async fn reconcile_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.coordinator.reconcile().await {
        Ok(reports) => (StatusCode::OK, Json(ReconcileResponse { success: true, reports })).into_response(),
        Err(err) => error_response(err.to_string()),
    }
}

/// `GET /events` (§6c): relays the Event Bus to any number of HTTP clients
/// as Server-Sent Events. A client disconnecting from this stream has no
/// effect on a run in progress (§5).
async fn events_handler(State(state): State<Arc<AppState>>) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = state.coordinator.events().subscribe();
    let stream = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Some((Ok(SseEvent::default().data(payload)), subscription))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn error_response(message: String) -> axum::response::Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "success": false, "message": message }))).into_response()
}

//! HTTP request handlers: health documents and memory log access.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};

use memwatch_core::api::{HealthReport, PurgeResult, ServiceHealth};
use memwatch_core::{LogEntry, StoreError};

use crate::state::AppState;

// ============================================================
// Health
// ============================================================

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is running", body = ServiceHealth)
    )
)]
pub(crate) async fn handle_health() -> Json<ServiceHealth> {
    Json(ServiceHealth::healthy())
}

#[utoipa::path(
    get,
    path = "/api/v1/health/memory",
    responses(
        (status = 200, description = "Current memory statistics and peak", body = HealthReport)
    )
)]
pub(crate) async fn handle_memory_health(State(state): AppState) -> Json<HealthReport> {
    let snapshot = state.monitor.snapshot();
    let peak = state.monitor.peak_allocated();
    Json(HealthReport::from_snapshot(&snapshot, peak, Utc::now()))
}

// ============================================================
// Memory logs
// ============================================================

#[derive(Deserialize, utoipa::IntoParams)]
pub(crate) struct LogsQuery {
    /// Inclusive lower bound (RFC 3339). Unbounded when absent.
    start: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339). Unbounded when absent.
    end: Option<DateTime<Utc>>,
}

#[utoipa::path(
    get,
    path = "/api/v1/memory/logs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Persisted snapshots in the range", body = Vec<LogEntry>),
        (status = 400, description = "start is after end"),
        (status = 503, description = "Log store unavailable")
    )
)]
pub(crate) async fn handle_logs(
    State(state): AppState,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogEntry>>, StatusCode> {
    if let (Some(start), Some(end)) = (query.start, query.end)
        && start > end
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Store reads may hit the disk.
    let logger = state.logger.clone();
    let result = tokio::task::spawn_blocking(move || match (query.start, query.end) {
        (None, None) => logger.query_all(),
        (start, end) => logger.query_range(
            start.unwrap_or(DateTime::<Utc>::MIN_UTC),
            end.unwrap_or(DateTime::<Utc>::MAX_UTC),
        ),
    })
    .await
    .map_err(|e| {
        error!(error = %e, "log query panicked");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    result.map(Json).map_err(store_status)
}

#[derive(Deserialize, utoipa::IntoParams)]
pub(crate) struct PurgeQuery {
    /// Entries strictly older than this instant (RFC 3339) are removed.
    older_than: DateTime<Utc>,
}

#[utoipa::path(
    delete,
    path = "/api/v1/memory/logs",
    params(PurgeQuery),
    responses(
        (status = 200, description = "Number of removed entries", body = PurgeResult),
        (status = 400, description = "Missing or invalid older_than"),
        (status = 503, description = "Log store unavailable")
    )
)]
pub(crate) async fn handle_purge(
    State(state): AppState,
    Query(query): Query<PurgeQuery>,
) -> Result<Json<PurgeResult>, StatusCode> {
    let logger = state.logger.clone();
    let cutoff = query.older_than;
    let removed = tokio::task::spawn_blocking(move || logger.purge_older_than(cutoff))
        .await
        .map_err(|e| {
            error!(error = %e, "log purge panicked");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(store_status)?;

    info!(removed, cutoff = %cutoff, "memory logs purged via API");
    Ok(Json(PurgeResult { removed }))
}

fn store_status(e: StoreError) -> StatusCode {
    error!(error = %e, "log store request failed");
    match e {
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Io(_) | StoreError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

use axum::{extract::State, http::StatusCode, Json};
use latency_probe::CallRecord;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use crate::AppState;

// ─── POST /api/calls ─────────────────────────────────────────────

/// Demo counter: tallies each posted record and logs it, so the run can
/// report how many records the emitter delivered.
pub async fn receive_call(
    State(state): State<Arc<AppState>>,
    Json(record): Json<CallRecord>,
) -> StatusCode {
    state.records_received.fetch_add(1, Ordering::Relaxed);
    if record.error_message.is_some() {
        state.failed_records.fetch_add(1, Ordering::Relaxed);
    }

    info!(
        status = record.status_code,
        method = %record.method,
        endpoint = %record.endpoint,
        latency_ms = record.latency,
        error = record.error_message.as_deref().unwrap_or(""),
        "call record"
    );

    StatusCode::ACCEPTED
}

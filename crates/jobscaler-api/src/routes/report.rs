//! Report API: workers post progress and per-message completion records
//! here. Both handlers only briefly hold the shared state lock and must
//! never block on the controller tick.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use jobscaler_core::MessageAuditRecord;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportProgressBody {
    pub job_name: String,
    pub processed: u64,
}

/// `POST /report` - `total_consumed += processed`;
/// `per_job_progress[job_name] += processed`.
pub async fn report_progress(
    State(state): State<AppState>,
    Json(body): Json<ReportProgressBody>,
) -> Json<Value> {
    state
        .state
        .record_progress(&body.job_name, body.processed)
        .await;
    Json(json!({ "status": "ok" }))
}

/// `POST /report-message` - insert into the audit store (failure is
/// swallowed and logged) and count the message toward `total_consumed`.
/// Not idempotent: duplicate posts of the same record produce duplicate
/// audit rows by design.
pub async fn report_message(
    State(state): State<AppState>,
    Json(record): Json<MessageAuditRecord>,
) -> Json<Value> {
    if let Err(e) = state.audit.insert_message(&record).await {
        tracing::error!(error = %e, message_id = %record.message_id, "failed to insert message audit record");
    }
    state.state.record_message().await;
    Json(json!({ "status": "recorded" }))
}

//! `GET /stats` - the aggregated snapshot the dashboard polls.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn get_stats(State(state): State<AppState>) -> Json<Value> {
    let (metrics, jobs) = state.state.snapshot().await;
    Json(json!({ "metrics": metrics, "jobs": jobs }))
}

//! `GET /logs/{job_name}?since_minutes=N` - tail a worker job's pod log.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::state::AppState;

const NO_POD_YET: &str = "No pods found for this job yet.";

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub since_minutes: u32,
}

pub async fn get_job_log(
    State(state): State<AppState>,
    Path(job_name): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<String, StatusCode> {
    match state
        .orchestrator
        .pod_log_tail(&job_name, query.since_minutes)
        .await
    {
        Ok(Some(log)) => Ok(log),
        Ok(None) => Ok(NO_POD_YET.to_string()),
        Err(e) => {
            tracing::error!(error = %e, job_name = %job_name, "failed to tail pod log");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

//! HTTP surface: report ingestion from workers and read endpoints for
//! the dashboard.

pub mod audit;
pub mod cluster;
pub mod logs;
pub mod report;
pub mod stats;

use axum::{routing::get, routing::post, Router};

use crate::state::AppState;

/// Routes that accept progress/completion reports from workers. No auth.
pub fn report_router() -> Router<AppState> {
    Router::new()
        .route("/report", post(report::report_progress))
        .route("/report-message", post(report::report_message))
}

/// Routes serving aggregated state to the dashboard. Guarded by basic auth.
pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats::get_stats))
        .route("/logs/:job_name", get(logs::get_job_log))
        .route("/audit", get(audit::get_audit))
        .route("/audit/log", get(audit::get_audit_log))
        .route("/cluster-info", get(cluster::get_cluster_info))
}

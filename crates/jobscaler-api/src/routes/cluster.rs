//! `GET /cluster-info` - nodes, recent events, and pods for the dashboard.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::state::AppState;

pub async fn get_cluster_info(
    State(state): State<AppState>,
) -> Result<Json<jobscaler_core::orchestrator::ClusterInfo>, StatusCode> {
    state.orchestrator.cluster_info().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "failed to fetch cluster info");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

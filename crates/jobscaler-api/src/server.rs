use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use jobscaler_core::bootstrap::Bootstrapped;
use jobscaler_core::Result;

use crate::middleware::basic_auth_middleware;
use crate::routes::{read_router, report_router};
use crate::state::AppState;

/// Run the report/read HTTP server. The scaling controller loop is
/// started separately by the caller; this only owns the HTTP surface.
pub async fn run(bootstrapped: &Bootstrapped) -> Result<()> {
    let addr = SocketAddr::from((
        bootstrapped
            .config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| jobscaler_core::Error::Config(format!("invalid host: {e}")))?,
        bootstrapped.config.server.port,
    ));

    let app_state = AppState::new(
        bootstrapped.state.clone(),
        bootstrapped.audit.clone(),
        bootstrapped.users.clone(),
        bootstrapped.orchestrator.clone(),
        bootstrapped.config.clone(),
    );

    let app = build_router(app_state);

    info!("job scaler API listening on http://{}", addr);
    log_routes();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| jobscaler_core::Error::Network(e.to_string()))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| jobscaler_core::Error::Network(e.to_string()))?;

    Ok(())
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let guarded_reads = read_router().route_layer(middleware::from_fn_with_state(
        app_state.clone(),
        basic_auth_middleware,
    ));

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(report_router())
        .merge(guarded_reads)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn log_routes() {
    info!("available routes:");
    info!("  POST /report                - worker progress reports");
    info!("  POST /report-message        - worker per-message completion reports");
    info!("  GET  /stats                 - aggregated metrics + job history");
    info!("  GET  /logs/:job_name        - pod log tail");
    info!("  GET  /audit                 - recent audit records");
    info!("  GET  /audit/log             - raw log file contents");
    info!("  GET  /cluster-info          - nodes, events, pods");
}

async fn health_check() -> &'static str {
    "OK"
}

async fn root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "jobscaler-api",
        "version": jobscaler_core::VERSION,
        "status": "operational",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }
}

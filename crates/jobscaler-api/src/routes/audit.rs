//! `GET /audit` and `GET /audit/log` - durable completion history and
//! raw log-file access, the latter scoped hard under the logs root.

use std::path::{Path, PathBuf};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::state::AppState;
use jobscaler_core::MessageAuditRecord;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn get_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<MessageAuditRecord>>, StatusCode> {
    let records = state.audit.recent(query.limit).await.map_err(|e| {
        tracing::error!(error = %e, "failed to list audit records");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub file_path: String,
}

pub async fn get_audit_log(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<String, StatusCode> {
    let resolved = resolve_log_path(&query.file_path, &state.config.logs.root)?;

    tokio::fs::read_to_string(&resolved)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)
}

/// Resolve `file_path` against the logs root. Absolute paths must already
/// live under the root or are refused outright; relative paths are
/// collapsed to their basename and joined under the root, matching the
/// original contract this endpoint replaces.
fn resolve_log_path(file_path: &str, logs_root: &str) -> Result<PathBuf, StatusCode> {
    let root = Path::new(logs_root);

    let candidate = if file_path.starts_with('/') {
        if !file_path.starts_with(logs_root) {
            return Err(StatusCode::FORBIDDEN);
        }
        PathBuf::from(file_path)
    } else {
        let basename = Path::new(file_path)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        root.join(basename)
    };

    if !candidate.starts_with(root) {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_outside_root_is_forbidden() {
        let err = resolve_log_path("/etc/passwd", "/logs").unwrap_err();
        assert_eq!(err, StatusCode::FORBIDDEN);
    }

    #[test]
    fn relative_traversal_collapses_to_basename_under_root() {
        let resolved = resolve_log_path("../../etc/passwd", "/logs").unwrap();
        assert_eq!(resolved, PathBuf::from("/logs/passwd"));
    }

    #[test]
    fn absolute_path_inside_root_is_kept() {
        let resolved = resolve_log_path("/logs/worker-abc.log", "/logs").unwrap();
        assert_eq!(resolved, PathBuf::from("/logs/worker-abc.log"));
    }
}

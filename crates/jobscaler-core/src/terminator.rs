//! Job Terminator: deletes at most one oldest, still-active,
//! non-terminating worker job per invocation. This ratchets scale-down
//! instead of mass-deleting the fleet in a single tick.

use std::sync::Arc;

use crate::model::WorkerJobRecord;
use crate::orchestrator::OrchestratorClient;

pub struct JobTerminator {
    orchestrator: Arc<dyn OrchestratorClient>,
}

impl JobTerminator {
    pub fn new(orchestrator: Arc<dyn OrchestratorClient>) -> Self {
        Self { orchestrator }
    }

    /// Delete the oldest active, non-terminating job, optionally restricted
    /// to `type_id`. Returns whether a job was deleted.
    pub async fn terminate_one(&self, type_id: Option<&str>) -> bool {
        let jobs = match self.orchestrator.list_worker_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "terminator failed to list jobs");
                return false;
            }
        };

        let Some(target) = pick_oldest_active(&jobs, type_id) else {
            tracing::debug!(?type_id, "no active non-terminating jobs to delete");
            return false;
        };

        if let Err(e) = self.orchestrator.delete_job(&target.name).await {
            tracing::warn!(job = %target.name, error = %e, "failed to delete job");
            return false;
        }

        tracing::info!(job = %target.name, "scaling down: deleted idle job");
        true
    }
}

fn pick_oldest_active<'a>(jobs: &'a [WorkerJobRecord], type_id: Option<&str>) -> Option<&'a WorkerJobRecord> {
    jobs.iter()
        .filter(|j| type_id.map(|t| j.type_id == t).unwrap_or(true))
        .filter(|j| j.active_count > 0 && !j.terminating)
        .min_by_key(|j| j.creation_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobPhase;
    use chrono::{Duration, Utc};

    fn job(name: &str, type_id: &str, active: i32, terminating: bool, age_secs: i64) -> WorkerJobRecord {
        WorkerJobRecord {
            name: name.to_string(),
            type_id: type_id.to_string(),
            start_time: None,
            creation_time: Some(Utc::now() - Duration::seconds(age_secs)),
            phase: JobPhase::Running,
            active_count: active,
            succeeded_count: 0,
            failed_count: 0,
            terminating,
            processed: 0,
        }
    }

    #[test]
    fn picks_oldest_active_non_terminating() {
        let jobs = vec![
            job("a", "t", 1, false, 10),
            job("b", "t", 1, false, 100),
            job("c", "t", 0, false, 200),
        ];
        let picked = pick_oldest_active(&jobs, Some("t")).unwrap();
        assert_eq!(picked.name, "b");
    }

    #[test]
    fn ignores_already_terminating_jobs() {
        let jobs = vec![job("a", "t", 1, true, 10)];
        assert!(pick_oldest_active(&jobs, Some("t")).is_none());
    }

    #[test]
    fn filters_by_type_when_given() {
        let jobs = vec![job("a", "other", 1, false, 5)];
        assert!(pick_oldest_active(&jobs, Some("t")).is_none());
    }

    #[test]
    fn no_candidates_returns_none() {
        let jobs: Vec<WorkerJobRecord> = vec![];
        assert!(pick_oldest_active(&jobs, None).is_none());
    }
}

//! Job Launcher: creates a new worker job for a given type and records the
//! launch event in the audit store.

use sqlx::PgPool;
use std::sync::Arc;

use crate::model::JobTypeSpec;
use crate::orchestrator::{generate_job_name, job_spec_for, OrchestratorClient};

/// Launches worker jobs and writes `job_audit` rows on success.
pub struct JobLauncher {
    orchestrator: Arc<dyn OrchestratorClient>,
    pool: PgPool,
    broker_host: String,
    report_url: String,
    logs_root: String,
}

impl JobLauncher {
    pub fn new(
        orchestrator: Arc<dyn OrchestratorClient>,
        pool: PgPool,
        broker_host: String,
        report_url: String,
        logs_root: String,
    ) -> Self {
        Self {
            orchestrator,
            pool,
            broker_host,
            report_url,
            logs_root,
        }
    }

    /// Launch one worker job for `job_type`. Errors are logged and swallowed;
    /// the caller increments `total_spawned` only on success.
    pub async fn launch(&self, job_type: &JobTypeSpec) -> bool {
        let job_name = generate_job_name(&job_type.type_id);
        let spec = job_spec_for(
            job_name.clone(),
            job_type,
            &self.broker_host,
            &self.report_url,
            &self.logs_root,
        );

        if let Err(e) = self.orchestrator.create_job(&spec).await {
            tracing::warn!(job_type = %job_type.type_id, error = %e, "failed to create job");
            return false;
        }

        tracing::info!(job_name = %job_name, job_type = %job_type.type_id, "created job");

        if let Err(e) = sqlx::query(
            "INSERT INTO job_audit (job_id, job_type, status) VALUES ($1, $2, $3)",
        )
        .bind(&job_name)
        .bind(&job_type.type_id)
        .bind("SPAWNED")
        .execute(&self.pool)
        .await
        {
            tracing::warn!(job_name = %job_name, error = %e, "job audit write failed");
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{ClusterInfo, JobSpec};
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOrchestrator {
        create_calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl OrchestratorClient for CountingOrchestrator {
        async fn list_worker_jobs(&self) -> Result<Vec<crate::model::WorkerJobRecord>> {
            Ok(vec![])
        }

        async fn create_job(&self, _spec: &JobSpec) -> Result<()> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(crate::Error::orchestrator("boom"));
            }
            Ok(())
        }

        async fn delete_job(&self, _name: &str) -> Result<()> {
            Ok(())
        }

        async fn pod_log_tail(&self, _job_name: &str, _since_minutes: u32) -> Result<Option<String>> {
            Ok(None)
        }

        async fn cluster_info(&self) -> Result<ClusterInfo> {
            Ok(ClusterInfo {
                nodes: vec![],
                events: vec![],
                pods: vec![],
            })
        }
    }

    fn job_type() -> JobTypeSpec {
        JobTypeSpec {
            type_id: "spend-analysis".to_string(),
            queue: "spend_q".to_string(),
            image: "worker:1".to_string(),
            threshold: 10,
            pull_secret: None,
        }
    }

    #[tokio::test]
    async fn create_job_error_is_visible_to_caller() {
        let orchestrator = CountingOrchestrator {
            create_calls: AtomicUsize::new(0),
            fail: true,
        };
        let spec = job_spec_for(
            generate_job_name(&job_type().type_id),
            &job_type(),
            "rabbitmq",
            "http://scaler:8000/report",
            "/logs",
        );
        assert!(orchestrator.create_job(&spec).await.is_err());
        assert_eq!(orchestrator.create_calls.load(Ordering::SeqCst), 1);
    }
}

//! Core data model: job-type catalog entries, observed worker-job state,
//! per-message audit records, and the aggregate metrics snapshot served
//! to the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declarative, immutable-after-load description of one job type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTypeSpec {
    pub type_id: String,
    pub queue: String,
    pub image: String,
    pub threshold: u32,
    #[serde(default)]
    pub pull_secret: Option<String>,
}

/// Mutable per-type scaling state. Owned by the controller, one per
/// catalog entry.
#[derive(Debug, Clone, Default)]
pub struct JobTypeState {
    pub idle_ticks: u32,
}

impl JobTypeState {
    /// Reset idle ticks on a non-idle observation.
    pub fn reset(&mut self) {
        self.idle_ticks = 0;
    }

    /// Advance the idle ratchet, clamping to `idle_threshold`.
    pub fn bump_idle(&mut self, idle_threshold: u32) {
        self.idle_ticks = (self.idle_ticks + 1).min(idle_threshold);
    }
}

/// Phase of a worker job as observed through the orchestrator, derived
/// from its reported succeeded/failed/active counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobPhase {
    pub fn from_counts(succeeded: i32, failed: i32, active: i32) -> Self {
        if succeeded >= 1 {
            JobPhase::Succeeded
        } else if failed >= 1 {
            JobPhase::Failed
        } else if active == 0 {
            JobPhase::Pending
        } else {
            JobPhase::Running
        }
    }

    /// A job still occupies a budget slot until it has definitively
    /// succeeded or failed - this includes Pending jobs with no pod yet.
    pub fn occupies_slot(succeeded: i32, failed: i32) -> bool {
        succeeded == 0 && failed == 0
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Pending => write!(f, "Pending"),
            JobPhase::Running => write!(f, "Running"),
            JobPhase::Succeeded => write!(f, "Succeeded"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// One worker job as observed from the orchestrator. Not authoritative -
/// the orchestrator is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerJobRecord {
    pub name: String,
    pub type_id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub creation_time: Option<DateTime<Utc>>,
    pub phase: JobPhase,
    pub active_count: i32,
    pub succeeded_count: i32,
    pub failed_count: i32,
    pub terminating: bool,
    pub processed: u64,
}

/// A row of the job history shown to the dashboard - a trimmed view of
/// `WorkerJobRecord`.
#[derive(Debug, Clone, Serialize)]
pub struct JobHistoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    pub status: String,
    pub start_time: String,
    pub processed: u64,
}

impl JobHistoryEntry {
    /// Build one history row from an observed job, joining in its
    /// processed-message count from the per-job progress map (keyed by job
    /// name) rather than trusting `WorkerJobRecord.processed`, which the
    /// orchestrator never populates.
    fn from_job(job: &WorkerJobRecord, progress: &HashMap<String, u64>) -> Self {
        let mut status = job.phase.to_string();
        if job.phase == JobPhase::Running && job.active_count == 0 {
            status = "Pending".to_string();
        }
        Self {
            name: job.name.clone(),
            type_id: job.type_id.clone(),
            status,
            start_time: job
                .start_time
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            processed: progress.get(&job.name).copied().unwrap_or(job.processed),
        }
    }
}

/// Maximum number of job history rows retained for the dashboard.
pub const MAX_HISTORY: usize = 50;

/// Build the dashboard job-history list from observed worker jobs: sorted
/// by `start_time` descending (jobs with no start time sort last), capped
/// at [`MAX_HISTORY`], with each row's `processed` count joined in from
/// `progress` (the controller's per-job progress map, keyed by job name).
pub fn history_from_jobs(
    jobs: &[WorkerJobRecord],
    progress: &HashMap<String, u64>,
) -> Vec<JobHistoryEntry> {
    let mut sorted: Vec<&WorkerJobRecord> = jobs.iter().collect();
    sorted.sort_by(|a, b| match (a.start_time, b.start_time) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted.truncate(MAX_HISTORY);
    sorted
        .into_iter()
        .map(|job| JobHistoryEntry::from_job(job, progress))
        .collect()
}

/// Status of a single message, as reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Success,
    Failure,
}

/// Durable per-message completion record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageAuditRecord {
    pub message_id: String,
    pub job_type: String,
    #[serde(alias = "worker_name", rename = "worker_pod")]
    pub worker_pod: String,
    pub queued_at: DateTime<Utc>,
    pub picked_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: String,
    pub log_file: String,
}

/// Per-type scaling status surfaced on `/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ScalingStatus {
    pub active: i32,
    pub idle_seconds: u64,
    pub scale_down_in_seconds: u64,
    pub is_idle: bool,
}

/// Aggregate, derived, read-mostly snapshot of controller state.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub queue_depth: i64,
    pub unacked: i64,
    pub active_jobs: i32,
    pub max_jobs: i32,
    pub total_spawned: u64,
    pub total_consumed: u64,
    pub avg_latency_ms: f64,
    pub throughput_per_minute: i64,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub status_msg: String,
    pub scaling_status: HashMap<String, ScalingStatus>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            queue_depth: 0,
            unacked: 0,
            active_jobs: 0,
            max_jobs: 0,
            total_spawned: 0,
            total_consumed: 0,
            avg_latency_ms: 0.0,
            throughput_per_minute: 0,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            status_msg: "Starting".to_string(),
            scaling_status: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_from_counts() {
        assert_eq!(JobPhase::from_counts(1, 0, 0), JobPhase::Succeeded);
        assert_eq!(JobPhase::from_counts(0, 1, 1), JobPhase::Failed);
        assert_eq!(JobPhase::from_counts(0, 0, 0), JobPhase::Pending);
        assert_eq!(JobPhase::from_counts(0, 0, 1), JobPhase::Running);
    }

    #[test]
    fn occupies_slot_before_pod_exists() {
        assert!(JobPhase::occupies_slot(0, 0));
        assert!(!JobPhase::occupies_slot(1, 0));
        assert!(!JobPhase::occupies_slot(0, 1));
    }

    #[test]
    fn idle_ratchet_clamps() {
        let mut state = JobTypeState::default();
        for _ in 0..10 {
            state.bump_idle(6);
        }
        assert_eq!(state.idle_ticks, 6);
        state.reset();
        assert_eq!(state.idle_ticks, 0);
    }

    fn job_with_start(name: &str, start: Option<DateTime<Utc>>) -> WorkerJobRecord {
        WorkerJobRecord {
            name: name.to_string(),
            type_id: "t".to_string(),
            start_time: start,
            creation_time: start,
            phase: JobPhase::Running,
            active_count: 1,
            succeeded_count: 0,
            failed_count: 0,
            terminating: false,
            processed: 0,
        }
    }

    #[test]
    fn history_sorts_descending_with_absent_start_times_last() {
        let now = Utc::now();
        let jobs = vec![
            job_with_start("older", Some(now - chrono::Duration::minutes(5))),
            job_with_start("no-start", None),
            job_with_start("newer", Some(now)),
        ];
        let history = history_from_jobs(&jobs, &HashMap::new());
        let names: Vec<&str> = history.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["newer", "older", "no-start"]);
    }

    #[test]
    fn history_caps_at_max_history() {
        let now = Utc::now();
        let jobs: Vec<WorkerJobRecord> = (0..60)
            .map(|i| job_with_start(&format!("j{i}"), Some(now - chrono::Duration::seconds(i))))
            .collect();
        assert_eq!(history_from_jobs(&jobs, &HashMap::new()).len(), MAX_HISTORY);
    }

    #[test]
    fn history_joins_processed_count_from_progress_map() {
        let jobs = vec![job_with_start("job-a", Some(Utc::now()))];
        let mut progress = HashMap::new();
        progress.insert("job-a".to_string(), 42u64);
        let history = history_from_jobs(&jobs, &progress);
        assert_eq!(history[0].processed, 42);
    }
}

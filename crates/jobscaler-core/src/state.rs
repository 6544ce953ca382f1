//! Process-wide shared mutable state: the metrics snapshot, per-job
//! progress, job history, and per-type scaling state. A single
//! `tokio::sync::RwLock` guards all of it; readers (HTTP handlers) and
//! the controller tick never observe a torn update.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::model::{JobHistoryEntry, JobTypeState, MetricsSnapshot};

#[derive(Debug, Default)]
struct Inner {
    metrics: MetricsSnapshot,
    per_job_progress: HashMap<String, u64>,
    job_history: Vec<JobHistoryEntry>,
    type_state: HashMap<String, JobTypeState>,
}

/// Shared, mutex-guarded controller state. Cheap to clone (it's an `Arc`).
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<Inner>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `/report` progress update.
    pub async fn record_progress(&self, job_name: &str, processed: u64) {
        let mut guard = self.inner.write().await;
        guard.metrics.total_consumed += processed;
        *guard.per_job_progress.entry(job_name.to_string()).or_insert(0) += processed;
    }

    /// Record a `/report-message` arrival (audit insert happens separately).
    pub async fn record_message(&self) {
        let mut guard = self.inner.write().await;
        guard.metrics.total_consumed += 1;
    }

    /// Snapshot `{metrics, jobs}` for `GET /stats`.
    pub async fn snapshot(&self) -> (MetricsSnapshot, Vec<JobHistoryEntry>) {
        let guard = self.inner.read().await;
        (guard.metrics.clone(), guard.job_history.clone())
    }

    /// Current idle-tick count for a job type, 0 if never observed.
    pub async fn idle_ticks(&self, type_id: &str) -> u32 {
        let guard = self.inner.read().await;
        guard.type_state.get(type_id).map(|s| s.idle_ticks).unwrap_or(0)
    }

    /// Snapshot of per-job processed-message counts, keyed by job name, for
    /// joining into the dashboard job-history view.
    pub async fn per_job_progress(&self) -> HashMap<String, u64> {
        let guard = self.inner.read().await;
        guard.per_job_progress.clone()
    }

    /// Apply the tick's fully-computed updates in one locked section.
    pub async fn apply_tick(&self, update: TickUpdate) {
        let mut guard = self.inner.write().await;
        guard.metrics.queue_depth = update.queue_depth;
        guard.metrics.unacked = update.unacked;
        guard.metrics.active_jobs = update.active_jobs;
        guard.metrics.max_jobs = update.max_jobs;
        guard.metrics.total_spawned += update.spawned_this_tick;
        guard.metrics.avg_latency_ms = update.avg_latency_ms;
        guard.metrics.throughput_per_minute = update.throughput_per_minute;
        guard.metrics.cpu_percent = update.cpu_percent;
        guard.metrics.memory_percent = update.memory_percent;
        guard.metrics.status_msg = update.status_msg;
        guard.metrics.scaling_status = update.scaling_status;
        guard.job_history = update.job_history;
        guard.type_state = update.type_state;
    }

    /// Set only the error status, leaving all other metrics at their
    /// previous values - used when a tick fails before producing a full
    /// update.
    pub async fn mark_error(&self) {
        let mut guard = self.inner.write().await;
        guard.metrics.status_msg = "Error".to_string();
    }
}

/// Everything a completed controller tick needs to publish atomically.
pub struct TickUpdate {
    pub queue_depth: i64,
    pub unacked: i64,
    pub active_jobs: i32,
    pub max_jobs: i32,
    pub spawned_this_tick: u64,
    pub avg_latency_ms: f64,
    pub throughput_per_minute: i64,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub status_msg: String,
    pub scaling_status: HashMap<String, crate::model::ScalingStatus>,
    pub job_history: Vec<JobHistoryEntry>,
    pub type_state: HashMap<String, JobTypeState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_progress_accumulates_per_job() {
        let state = SharedState::new();
        state.record_progress("job-a", 5).await;
        state.record_progress("job-a", 3).await;
        state.record_progress("job-b", 1).await;

        let (metrics, _) = state.snapshot().await;
        assert_eq!(metrics.total_consumed, 9);
    }

    #[tokio::test]
    async fn record_message_increments_total_consumed() {
        let state = SharedState::new();
        state.record_message().await;
        state.record_message().await;
        let (metrics, _) = state.snapshot().await;
        assert_eq!(metrics.total_consumed, 2);
    }

    #[tokio::test]
    async fn mark_error_leaves_other_fields_untouched() {
        let state = SharedState::new();
        state.record_progress("job-a", 4).await;
        state.mark_error().await;
        let (metrics, _) = state.snapshot().await;
        assert_eq!(metrics.status_msg, "Error");
        assert_eq!(metrics.total_consumed, 4);
    }
}

//! Audit Store: durable per-message completion records plus the two
//! cheap aggregate queries the controller needs each tick.

use sqlx::PgPool;

use crate::model::MessageAuditRecord;
use crate::Result;

#[derive(Clone)]
pub struct AuditStore {
    pool: PgPool,
}

impl AuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a per-message completion record. Idempotency is not required:
    /// duplicate reports produce duplicate rows.
    pub async fn insert_message(&self, record: &MessageAuditRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO message_audit
                (message_id, job_type, worker_pod, queued_at, picked_at, processed_at, duration_ms, status, log_file)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&record.message_id)
        .bind(&record.job_type)
        .bind(&record.worker_pod)
        .bind(record.queued_at)
        .bind(record.picked_at)
        .bind(record.processed_at)
        .bind(record.duration_ms)
        .bind(&record.status)
        .bind(&record.log_file)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mean `duration_ms` over records processed in the last 10 minutes.
    /// Returns 0 when there are none.
    pub async fn avg_duration_ms(&self) -> f64 {
        let result: Result<Option<f64>> = sqlx::query_scalar(
            "SELECT AVG(duration_ms)::float8 FROM message_audit WHERE processed_at > NOW() - INTERVAL '10 minutes'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into);

        match result {
            Ok(Some(avg)) => avg,
            Ok(None) => 0.0,
            Err(e) => {
                tracing::warn!(error = %e, "avg_duration_ms query failed");
                0.0
            }
        }
    }

    /// Count of records processed in the last 60 seconds.
    pub async fn count_last_minute(&self) -> i64 {
        let result: Result<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM message_audit WHERE processed_at > NOW() - INTERVAL '1 minute'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into);

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "count_last_minute query failed");
            0
        })
    }

    /// Most recent `limit` audit records ordered by `processed_at` descending.
    pub async fn recent(&self, limit: i64) -> Result<Vec<MessageAuditRecord>> {
        let rows = sqlx::query_as::<_, MessageAuditRecord>(
            "SELECT message_id, job_type, worker_pod, queued_at, picked_at, processed_at, duration_ms, status, log_file
             FROM message_audit ORDER BY processed_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn message_audit_record_duration_matches_timestamps() {
        let queued = Utc::now();
        let picked = queued + chrono::Duration::seconds(1);
        let processed = picked + chrono::Duration::milliseconds(250);

        let record = MessageAuditRecord {
            message_id: "m1".to_string(),
            job_type: "spend-analysis".to_string(),
            worker_pod: "spend-analysis-ab12cd".to_string(),
            queued_at: queued,
            picked_at: picked,
            processed_at: processed,
            duration_ms: 250,
            status: "SUCCESS".to_string(),
            log_file: "/logs/spend-analysis-ab12cd.log".to_string(),
        };

        let expected = (record.processed_at - record.picked_at).num_milliseconds();
        assert_eq!(record.duration_ms, expected);
    }
}

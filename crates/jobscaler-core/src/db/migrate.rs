//! Database migration system.
//!
//! Runs migrations on startup and tracks which ones have been applied.

use sqlx::{PgPool, Row};
use tracing::{error, info};

use crate::{Error, Result};

/// Migration record tracking applied migrations.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

/// Database migration manager.
pub struct Migrator {
    pool: PgPool,
}

impl Migrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn init_migration_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_applied_migrations(&self) -> Result<Vec<Migration>> {
        let rows = sqlx::query(r#"SELECT version, name, applied_at FROM _migrations ORDER BY version"#)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Migration {
                version: row.get("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            })
            .collect())
    }

    async fn record_migration(&self, version: i64, name: &str) -> Result<()> {
        sqlx::query(r#"INSERT INTO _migrations (version, name) VALUES ($1, $2) ON CONFLICT DO NOTHING"#)
            .bind(version)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        info!("initializing migration system");
        self.init_migration_table().await?;

        let applied = self.get_applied_migrations().await?;
        info!(count = applied.len(), "found applied migrations");

        let migrations = vec![(1, "initial_schema", include_str!("../../../../migrations/001_initial_schema.sql"))];

        for (version, name, sql) in migrations {
            if applied.iter().any(|m| m.version == version) {
                info!(version, name, "migration already applied, skipping");
                continue;
            }

            info!(version, name, "applying migration");
            sqlx::raw_sql(sql).execute(&self.pool).await.map_err(|e| {
                error!(version, error = %e, "migration failed");
                Error::Database(e)
            })?;

            self.record_migration(version, name).await?;
            info!(version, name, "migration applied");
        }

        info!("all migrations completed");
        Ok(())
    }

    /// Database status information.
    pub async fn status(&self) -> Result<DbStatus> {
        self.init_migration_table().await?;
        let applied = self.get_applied_migrations().await?;

        let job_audit_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_audit")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);

        let message_audit_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_audit")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);

        Ok(DbStatus {
            applied_migrations: applied.len() as i64,
            job_audit_count,
            message_audit_count,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub applied_migrations: i64,
    pub job_audit_count: i64,
    pub message_audit_count: i64,
}

/// Run migrations automatically on server start.
pub async fn auto_migrate(pool: &PgPool) -> Result<()> {
    let migrator = Migrator::new(pool.clone());
    migrator.migrate().await?;
    Ok(())
}

// src/repositories/postgres/command_logs.rs

use std::time::Duration;

use async_trait::async_trait;
use bronxbot_common::models::CommandUsageRecord;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::Error;

/// Repository for the append-only usage and error logs.
#[async_trait]
pub trait CommandLogRepository: Send + Sync + 'static {
    async fn insert_usage(&self, rec: &CommandUsageRecord) -> Result<(), Error>;
    async fn insert_error(&self, rec: &CommandUsageRecord) -> Result<(), Error>;
    async fn recent_usage(&self, limit: i64) -> Result<Vec<CommandUsageRecord>, Error>;

    /// Delete rows older than the given windows. Returns the number of
    /// deleted rows across both tables.
    async fn prune(
        &self,
        usage_older_than: Duration,
        errors_older_than: Duration,
    ) -> Result<u64, Error>;
}

#[derive(Clone)]
pub struct PostgresCommandLogRepository {
    pool: Pool<Postgres>,
}

impl PostgresCommandLogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommandLogRepository for PostgresCommandLogRepository {
    async fn insert_usage(&self, rec: &CommandUsageRecord) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO command_logs (
                usage_id, command_name, user_id, guild_id,
                execution_time_ms, success, used_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&rec.command_name)
        .bind(rec.user_id)
        .bind(rec.guild_id)
        .bind(rec.execution_time_ms)
        .bind(rec.success)
        .bind(rec.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_error(&self, rec: &CommandUsageRecord) -> Result<(), Error> {
        let error_text = rec.error.clone().unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO error_logs (
                error_id, command_name, user_id, guild_id,
                error_text, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&rec.command_name)
        .bind(rec.user_id)
        .bind(rec.guild_id)
        .bind(error_text)
        .bind(rec.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_usage(&self, limit: i64) -> Result<Vec<CommandUsageRecord>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT command_name, user_id, guild_id,
                   execution_time_ms, success, used_at
            FROM command_logs
            ORDER BY used_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(CommandUsageRecord {
                command_name: row.try_get("command_name")?,
                user_id: row.try_get("user_id")?,
                guild_id: row.try_get("guild_id")?,
                execution_time_ms: row.try_get("execution_time_ms")?,
                success: row.try_get("success")?,
                error: None,
                timestamp: row.try_get("used_at")?,
            });
        }
        Ok(records)
    }

    async fn prune(
        &self,
        usage_older_than: Duration,
        errors_older_than: Duration,
    ) -> Result<u64, Error> {
        let usage_cutoff = Utc::now()
            - chrono::Duration::from_std(usage_older_than)
                .map_err(|e| Error::Parse(e.to_string()))?;
        let error_cutoff = Utc::now()
            - chrono::Duration::from_std(errors_older_than)
                .map_err(|e| Error::Parse(e.to_string()))?;

        let usage = sqlx::query("DELETE FROM command_logs WHERE used_at < $1")
            .bind(usage_cutoff)
            .execute(&self.pool)
            .await?;

        let errors = sqlx::query("DELETE FROM error_logs WHERE occurred_at < $1")
            .bind(error_cutoff)
            .execute(&self.pool)
            .await?;

        Ok(usage.rows_affected() + errors.rows_affected())
    }
}

// src/repositories/postgres/performance_logs.rs

use std::time::Duration;

use async_trait::async_trait;
use bronxbot_common::models::PerformanceSample;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::Error;

/// Repository for the append-only performance sample log. Samples have the
/// shortest retention window of any table (about a day).
#[async_trait]
pub trait PerformanceRepository: Send + Sync + 'static {
    async fn insert_sample(&self, sample: &PerformanceSample) -> Result<(), Error>;
    async fn recent_samples(&self, limit: i64) -> Result<Vec<PerformanceSample>, Error>;
    async fn prune(&self, older_than: Duration) -> Result<u64, Error>;
}

#[derive(Clone)]
pub struct PostgresPerformanceRepository {
    pool: Pool<Postgres>,
}

impl PostgresPerformanceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PerformanceRepository for PostgresPerformanceRepository {
    async fn insert_sample(&self, sample: &PerformanceSample) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO performance_logs (
                sample_id, cpu_usage_pct, memory_usage_pct,
                latency_ms, database_latency_ms,
                active_guild_count, uptime_seconds, sampled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sample.cpu_usage_pct as f64)
        .bind(sample.memory_usage_pct as f64)
        .bind(sample.latency_ms)
        .bind(sample.database_latency_ms)
        .bind(sample.active_guild_count)
        .bind(sample.uptime_seconds)
        .bind(sample.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_samples(&self, limit: i64) -> Result<Vec<PerformanceSample>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT cpu_usage_pct, memory_usage_pct,
                   latency_ms, database_latency_ms,
                   active_guild_count, uptime_seconds, sampled_at
            FROM performance_logs
            ORDER BY sampled_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut samples = Vec::with_capacity(rows.len());
        for row in rows {
            samples.push(PerformanceSample {
                cpu_usage_pct: row.try_get::<f64, _>("cpu_usage_pct")? as f32,
                memory_usage_pct: row.try_get::<f64, _>("memory_usage_pct")? as f32,
                latency_ms: row.try_get("latency_ms")?,
                database_latency_ms: row.try_get("database_latency_ms")?,
                active_guild_count: row.try_get("active_guild_count")?,
                uptime_seconds: row.try_get("uptime_seconds")?,
                timestamp: row.try_get("sampled_at")?,
            });
        }
        Ok(samples)
    }

    async fn prune(&self, older_than: Duration) -> Result<u64, Error> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).map_err(|e| Error::Parse(e.to_string()))?;

        let result = sqlx::query("DELETE FROM performance_logs WHERE sampled_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// src/repositories/postgres/daily_stats.rs

use async_trait::async_trait;
use bronxbot_common::models::stats::TOP_LIST_CAP;
use bronxbot_common::models::{DailyStats, HourlyStats};
use chrono::{NaiveDate, Utc};
use sqlx::{Pool, Postgres, Row};

use crate::Error;

/// Repository for the keyed daily/hourly stats documents. The stats manager
/// is the sole writer; writes are whole-document upserts because the
/// in-memory state is the source of truth between flushes.
#[async_trait]
pub trait StatsRepository: Send + Sync + 'static {
    async fn upsert_daily(&self, stats: &DailyStats) -> Result<(), Error>;
    async fn upsert_hourly(&self, stats: &HourlyStats) -> Result<(), Error>;
    async fn load_daily(&self, date: NaiveDate) -> Result<Option<DailyStats>, Error>;
    async fn load_hourly(&self, bucket: &str) -> Result<Option<HourlyStats>, Error>;
}

#[derive(Clone)]
pub struct PostgresStatsRepository {
    pool: Pool<Postgres>,
}

impl PostgresStatsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    async fn upsert_daily(&self, stats: &DailyStats) -> Result<(), Error> {
        let breakdown = serde_json::to_value(&stats.command_breakdown)?;
        let user_counts = serde_json::to_value(&stats.user_counts)?;
        let guild_counts = serde_json::to_value(&stats.guild_counts)?;
        let hourly = serde_json::to_value(stats.hourly_usage)?;
        let top_commands = serde_json::to_value(stats.top_commands(TOP_LIST_CAP))?;
        let top_users = serde_json::to_value(stats.top_users(TOP_LIST_CAP))?;
        let top_guilds = serde_json::to_value(stats.top_guilds(TOP_LIST_CAP))?;

        sqlx::query(
            r#"
            INSERT INTO daily_stats (
                date, total_commands, errors,
                command_breakdown, user_counts, guild_counts,
                hourly_usage, top_commands, top_users, top_guilds,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (date) DO UPDATE
              SET total_commands   = EXCLUDED.total_commands,
                  errors           = EXCLUDED.errors,
                  command_breakdown = EXCLUDED.command_breakdown,
                  user_counts      = EXCLUDED.user_counts,
                  guild_counts     = EXCLUDED.guild_counts,
                  hourly_usage     = EXCLUDED.hourly_usage,
                  top_commands     = EXCLUDED.top_commands,
                  top_users        = EXCLUDED.top_users,
                  top_guilds       = EXCLUDED.top_guilds,
                  updated_at       = EXCLUDED.updated_at
            "#,
        )
        .bind(stats.date.to_string())
        .bind(stats.total_commands as i64)
        .bind(stats.errors as i64)
        .bind(breakdown)
        .bind(user_counts)
        .bind(guild_counts)
        .bind(hourly)
        .bind(top_commands)
        .bind(top_users)
        .bind(top_guilds)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_hourly(&self, stats: &HourlyStats) -> Result<(), Error> {
        let breakdown = serde_json::to_value(&stats.command_breakdown)?;

        sqlx::query(
            r#"
            INSERT INTO hourly_stats (bucket, total_commands, command_breakdown)
            VALUES ($1, $2, $3)
            ON CONFLICT (bucket) DO UPDATE
              SET total_commands    = EXCLUDED.total_commands,
                  command_breakdown = EXCLUDED.command_breakdown
            "#,
        )
        .bind(&stats.bucket)
        .bind(stats.total_commands as i64)
        .bind(breakdown)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_daily(&self, date: NaiveDate) -> Result<Option<DailyStats>, Error> {
        let row = sqlx::query(
            r#"
            SELECT total_commands, errors,
                   command_breakdown, user_counts, guild_counts,
                   hourly_usage, updated_at
            FROM daily_stats
            WHERE date = $1
            "#,
        )
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut stats = DailyStats::new(date);
        stats.total_commands = row.try_get::<i64, _>("total_commands")?.max(0) as u64;
        stats.errors = row.try_get::<i64, _>("errors")?.max(0) as u64;
        // Malformed JSON columns fall back to empty defaults rather than
        // failing the whole load.
        stats.command_breakdown =
            serde_json::from_value(row.try_get("command_breakdown")?).unwrap_or_default();
        stats.user_counts =
            serde_json::from_value(row.try_get("user_counts")?).unwrap_or_default();
        stats.guild_counts =
            serde_json::from_value(row.try_get("guild_counts")?).unwrap_or_default();
        stats.hourly_usage =
            serde_json::from_value(row.try_get("hourly_usage")?).unwrap_or([0; 24]);
        stats.updated_at = row.try_get("updated_at")?;

        Ok(Some(stats))
    }

    async fn load_hourly(&self, bucket: &str) -> Result<Option<HourlyStats>, Error> {
        let row = sqlx::query(
            r#"
            SELECT total_commands, command_breakdown
            FROM hourly_stats
            WHERE bucket = $1
            "#,
        )
        .bind(bucket)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut stats = HourlyStats::new(bucket);
        stats.total_commands = row.try_get::<i64, _>("total_commands")?.max(0) as u64;
        stats.command_breakdown =
            serde_json::from_value(row.try_get("command_breakdown")?).unwrap_or_default();

        Ok(Some(stats))
    }
}

// File: bronxbot-common/src/models/stats.rs

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on the length of any persisted top-N list.
pub const TOP_LIST_CAP: usize = 20;

/// One command completion or failure, as observed by the tracking pipeline.
/// Records are append-only: created once, never mutated, pruned by retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandUsageRecord {
    pub command_name: String,
    pub user_id: i64,
    pub guild_id: Option<i64>,
    pub execution_time_ms: f64,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CommandUsageRecord {
    pub fn completed(
        command_name: &str,
        user_id: i64,
        guild_id: Option<i64>,
        execution_time_ms: f64,
    ) -> Self {
        Self {
            command_name: command_name.to_string(),
            user_id,
            guild_id,
            execution_time_ms,
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn errored(
        command_name: &str,
        user_id: i64,
        guild_id: Option<i64>,
        execution_time_ms: f64,
        error: &str,
    ) -> Self {
        Self {
            command_name: command_name.to_string(),
            user_id,
            guild_id,
            execution_time_ms,
            success: false,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// One entry of a top-N list (command name, user id or guild id as string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopEntry {
    pub key: String,
    pub count: u64,
}

impl TopEntry {
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self { key: key.into(), count }
    }
}

/// The daily stats document, keyed by UTC date. Mutated in place across the
/// day by the stats manager; archived and replaced at the daily reset.
///
/// All fields carry serde defaults so documents written by an older build
/// load cleanly with missing fields filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    #[serde(default)]
    pub total_commands: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub command_breakdown: HashMap<String, u64>,
    #[serde(default)]
    pub user_counts: HashMap<String, u64>,
    #[serde(default)]
    pub guild_counts: HashMap<String, u64>,
    #[serde(default = "zero_hours")]
    pub hourly_usage: [u64; 24],
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn zero_hours() -> [u64; 24] {
    [0; 24]
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_commands: 0,
            errors: 0,
            command_breakdown: HashMap::new(),
            user_counts: HashMap::new(),
            guild_counts: HashMap::new(),
            hourly_usage: zero_hours(),
            updated_at: Utc::now(),
        }
    }

    /// Fold one usage record into the day's counters.
    pub fn record(&mut self, rec: &CommandUsageRecord) {
        self.total_commands += 1;
        if !rec.success {
            self.errors += 1;
        }
        *self
            .command_breakdown
            .entry(rec.command_name.clone())
            .or_insert(0) += 1;
        *self
            .user_counts
            .entry(rec.user_id.to_string())
            .or_insert(0) += 1;
        if let Some(gid) = rec.guild_id {
            *self.guild_counts.entry(gid.to_string()).or_insert(0) += 1;
        }
        let hour = rec.timestamp.hour() as usize;
        self.hourly_usage[hour] += 1;
        self.updated_at = Utc::now();
    }

    pub fn top_commands(&self, limit: usize) -> Vec<TopEntry> {
        top_of(&self.command_breakdown, limit)
    }

    pub fn top_users(&self, limit: usize) -> Vec<TopEntry> {
        top_of(&self.user_counts, limit)
    }

    pub fn top_guilds(&self, limit: usize) -> Vec<TopEntry> {
        top_of(&self.guild_counts, limit)
    }
}

/// Sort a count map descending and truncate. Ties break on the key so the
/// result is deterministic.
fn top_of(map: &HashMap<String, u64>, limit: usize) -> Vec<TopEntry> {
    let mut entries: Vec<TopEntry> = map
        .iter()
        .map(|(k, v)| TopEntry::new(k.clone(), *v))
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries.truncate(limit.min(TOP_LIST_CAP));
    entries
}

/// The hourly stats document, keyed by a `YYYY-MM-DD-HH` bucket string (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyStats {
    pub bucket: String,
    #[serde(default)]
    pub total_commands: u64,
    #[serde(default)]
    pub command_breakdown: HashMap<String, u64>,
}

impl HourlyStats {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            total_commands: 0,
            command_breakdown: HashMap::new(),
        }
    }

    pub fn record(&mut self, rec: &CommandUsageRecord) {
        self.total_commands += 1;
        *self
            .command_breakdown
            .entry(rec.command_name.clone())
            .or_insert(0) += 1;
    }
}

/// Bucket key for an hourly document.
pub fn hour_bucket(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d-%H").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rec(name: &str, user: i64, guild: Option<i64>, success: bool) -> CommandUsageRecord {
        CommandUsageRecord {
            command_name: name.to_string(),
            user_id: user,
            guild_id: guild,
            execution_time_ms: 20.0,
            success,
            error: if success { None } else { Some("boom".into()) },
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 13, 30, 0).unwrap(),
        }
    }

    #[test]
    fn record_updates_all_counters() {
        let mut day = DailyStats::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        day.record(&rec("ping", 1, Some(10), true));
        day.record(&rec("ping", 1, Some(10), true));
        day.record(&rec("ping", 2, None, false));

        assert_eq!(day.total_commands, 3);
        assert_eq!(day.errors, 1);
        assert_eq!(day.command_breakdown.get("ping"), Some(&3));
        assert_eq!(day.user_counts.get("1"), Some(&2));
        assert_eq!(day.guild_counts.get("10"), Some(&2));
        assert_eq!(day.hourly_usage[13], 3);
        // no guild entry for the DM invocation
        assert_eq!(day.guild_counts.len(), 1);
    }

    #[test]
    fn top_lists_sorted_and_truncated() {
        let mut day = DailyStats::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        for _ in 0..5 {
            day.record(&rec("a", 1, None, true));
        }
        for _ in 0..3 {
            day.record(&rec("b", 1, None, true));
        }
        for _ in 0..8 {
            day.record(&rec("c", 1, None, true));
        }

        let top = day.top_commands(2);
        assert_eq!(top, vec![TopEntry::new("c", 8), TopEntry::new("a", 5)]);

        let all = day.top_commands(50);
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn hour_bucket_format() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 7, 5, 0).unwrap();
        assert_eq!(hour_bucket(ts), "2025-06-01-07");
    }

    #[test]
    fn daily_stats_round_trips_with_missing_fields() {
        // Older documents may lack newer fields; serde defaults fill them.
        let v = serde_json::json!({ "date": "2025-06-01", "total_commands": 7 });
        let day: DailyStats = serde_json::from_value(v).unwrap();
        assert_eq!(day.total_commands, 7);
        assert_eq!(day.errors, 0);
        assert_eq!(day.hourly_usage, [0u64; 24]);
    }
}

// src/stats/manager.rs
//
// Owns the canonical in-memory counters and is the only writer of the
// daily/hourly persisted documents.

use std::collections::HashMap;
use std::sync::Arc;

use bronxbot_common::models::stats::{hour_bucket, TOP_LIST_CAP};
use bronxbot_common::models::{CommandUsageRecord, DailyStats, HourlyStats, TopEntry};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::repositories::postgres::StatsRepository;
use crate::Error;

#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Maximum length of any top-N list handed out or persisted.
    pub top_list_cap: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_list_cap: TOP_LIST_CAP,
        }
    }
}

struct DayState {
    daily: DailyStats,
    /// Hour buckets touched today, keyed by `YYYY-MM-DD-HH`.
    hourly: HashMap<String, HourlyStats>,
}

impl DayState {
    fn fresh() -> Self {
        Self {
            daily: DailyStats::new(Utc::now().date_naive()),
            hourly: HashMap::new(),
        }
    }
}

/// All counter mutations go through one mutex. The original ran on a
/// cooperatively scheduled single thread and skipped locking; on a
/// multi-threaded runtime that assumption does not hold. The lock is never
/// held across repository I/O: state is cloned out first.
pub struct StatsManager {
    repo: Arc<dyn StatsRepository>,
    state: Mutex<DayState>,
    config: StatsConfig,
}

impl StatsManager {
    pub fn new(repo: Arc<dyn StatsRepository>, config: StatsConfig) -> Self {
        Self {
            repo,
            state: Mutex::new(DayState::fresh()),
            config,
        }
    }

    /// Fold one usage record into the in-memory counters. No external I/O.
    pub async fn update_command_stats(&self, record: &CommandUsageRecord) {
        let mut state = self.state.lock().await;
        state.daily.record(record);

        let bucket = hour_bucket(record.timestamp);
        state
            .hourly
            .entry(bucket.clone())
            .or_insert_with(|| HourlyStats::new(bucket))
            .record(record);
    }

    pub async fn get_top_commands(&self, limit: usize) -> Vec<TopEntry> {
        let state = self.state.lock().await;
        state.daily.top_commands(limit.min(self.config.top_list_cap))
    }

    pub async fn get_top_users(&self, limit: usize) -> Vec<TopEntry> {
        let state = self.state.lock().await;
        state.daily.top_users(limit.min(self.config.top_list_cap))
    }

    pub async fn get_top_guilds(&self, limit: usize) -> Vec<TopEntry> {
        let state = self.state.lock().await;
        state.daily.top_guilds(limit.min(self.config.top_list_cap))
    }

    /// `(total_commands, errors)` for the current day.
    pub async fn totals(&self) -> (u64, u64) {
        let state = self.state.lock().await;
        (state.daily.total_commands, state.daily.errors)
    }

    /// Clone of the current day document, for dashboard payloads and the
    /// owner status report.
    pub async fn snapshot(&self) -> DailyStats {
        self.state.lock().await.daily.clone()
    }

    /// Upsert the current daily document plus the current and previous
    /// hour's documents (the previous hour may have received records since
    /// the last flush before the rollover). Failure is logged and swallowed;
    /// in-memory state stays authoritative and the next scheduled tick
    /// retries.
    pub async fn save_stats(&self) {
        if let Err(e) = self.try_save().await {
            warn!("stats save failed, retrying on next tick: {:?}", e);
        }
    }

    async fn try_save(&self) -> Result<(), Error> {
        let (daily, buckets) = {
            let state = self.state.lock().await;
            let now = Utc::now();
            let keys = [
                hour_bucket(now - chrono::Duration::hours(1)),
                hour_bucket(now),
            ];
            let buckets: Vec<HourlyStats> = keys
                .iter()
                .filter_map(|key| state.hourly.get(key).cloned())
                .collect();
            (state.daily.clone(), buckets)
        };

        self.repo.upsert_daily(&daily).await?;
        for hourly in &buckets {
            self.repo.upsert_hourly(hourly).await?;
        }
        Ok(())
    }

    /// Merge the persisted document for today back into memory. Adopted only
    /// when the stored counters are ahead of (or equal to) the in-memory
    /// ones, which covers a process restart without clobbering a live day.
    pub async fn load_today(&self) {
        let today = Utc::now().date_naive();
        match self.repo.load_daily(today).await {
            Ok(Some(stored)) => {
                let mut state = self.state.lock().await;
                if state.daily.date == today && stored.total_commands >= state.daily.total_commands
                {
                    info!(
                        "adopting persisted daily stats for {} ({} commands)",
                        today, stored.total_commands
                    );
                    state.daily = stored;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("could not load persisted daily stats: {:?}", e),
        }
    }

    /// Archive the current snapshot under its own date key, then zero every
    /// day-scoped counter and roll the date forward. Runs once per day at
    /// the configured reset hour; at that point the in-memory date is the
    /// day that just ended.
    pub async fn reset_daily_stats(&self) {
        let archived = {
            let mut state = self.state.lock().await;
            let old = state.daily.clone();
            state.daily = DailyStats::new(Utc::now().date_naive());
            state.hourly.clear();
            old
        };

        info!(
            "daily stats reset: archived {} with {} commands",
            archived.date, archived.total_commands
        );
        if let Err(e) = self.repo.upsert_daily(&archived).await {
            warn!("failed to archive daily snapshot for {}: {:?}", archived.date, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap as StdHashMap;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;

    /// In-memory StatsRepository used across the stats tests.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryStatsRepo {
        pub daily: Arc<Mutex<StdHashMap<NaiveDate, DailyStats>>>,
        pub hourly: Arc<Mutex<StdHashMap<String, HourlyStats>>>,
    }

    #[async_trait]
    impl StatsRepository for MemoryStatsRepo {
        async fn upsert_daily(&self, stats: &DailyStats) -> Result<(), Error> {
            self.daily.lock().await.insert(stats.date, stats.clone());
            Ok(())
        }

        async fn upsert_hourly(&self, stats: &HourlyStats) -> Result<(), Error> {
            self.hourly
                .lock()
                .await
                .insert(stats.bucket.clone(), stats.clone());
            Ok(())
        }

        async fn load_daily(&self, date: NaiveDate) -> Result<Option<DailyStats>, Error> {
            Ok(self.daily.lock().await.get(&date).cloned())
        }

        async fn load_hourly(&self, bucket: &str) -> Result<Option<HourlyStats>, Error> {
            Ok(self.hourly.lock().await.get(bucket).cloned())
        }
    }

    fn manager() -> (StatsManager, MemoryStatsRepo) {
        let repo = MemoryStatsRepo::default();
        let mgr = StatsManager::new(Arc::new(repo.clone()), StatsConfig::default());
        (mgr, repo)
    }

    #[tokio::test]
    async fn totals_match_update_calls() {
        let (mgr, _repo) = manager();

        for _ in 0..3 {
            mgr.update_command_stats(&CommandUsageRecord::completed("ping", 1, Some(10), 20.0))
                .await;
        }
        mgr.update_command_stats(&CommandUsageRecord::errored("ping", 1, Some(10), 20.0, "boom"))
            .await;

        let (total, errors) = mgr.totals().await;
        assert_eq!(total, 4);
        assert_eq!(errors, 1);

        let snap = mgr.snapshot().await;
        assert_eq!(snap.command_breakdown.get("ping"), Some(&4));
    }

    #[tokio::test]
    async fn top_commands_sorted_and_limited() {
        let (mgr, _repo) = manager();

        for (name, count) in [("a", 5), ("b", 3), ("c", 8)] {
            for _ in 0..count {
                mgr.update_command_stats(&CommandUsageRecord::completed(name, 1, None, 5.0))
                    .await;
            }
        }

        let top = mgr.get_top_commands(2).await;
        assert_eq!(top, vec![TopEntry::new("c", 8), TopEntry::new("a", 5)]);

        // a huge limit is clamped to the configured cap
        let all = mgr.get_top_commands(10_000).await;
        assert!(all.len() <= TOP_LIST_CAP);
    }

    #[tokio::test]
    async fn save_persists_daily_and_hourly() {
        let (mgr, repo) = manager();

        mgr.update_command_stats(&CommandUsageRecord::completed("fish", 7, Some(3), 12.0))
            .await;
        mgr.save_stats().await;

        let today = Utc::now().date_naive();
        let stored = repo.daily.lock().await.get(&today).cloned().unwrap();
        assert_eq!(stored.total_commands, 1);

        let bucket = hour_bucket(Utc::now());
        let hourly = repo.hourly.lock().await.get(&bucket).cloned().unwrap();
        assert_eq!(hourly.total_commands, 1);
        assert_eq!(hourly.command_breakdown.get("fish"), Some(&1));
    }

    #[tokio::test]
    async fn save_flushes_previous_hour_after_rollover() {
        let (mgr, repo) = manager();

        // record landed just before the hour rolled over, first save after
        let mut rec = CommandUsageRecord::completed("ping", 1, None, 5.0);
        rec.timestamp = Utc::now() - chrono::Duration::hours(1);
        mgr.update_command_stats(&rec).await;
        mgr.save_stats().await;

        let bucket = hour_bucket(rec.timestamp);
        let hourly = repo.hourly.lock().await.get(&bucket).cloned().unwrap();
        assert_eq!(hourly.total_commands, 1);
        assert_eq!(hourly.command_breakdown.get("ping"), Some(&1));
    }

    #[tokio::test]
    async fn reset_archives_then_zeroes() {
        let (mgr, repo) = manager();

        for _ in 0..5 {
            mgr.update_command_stats(&CommandUsageRecord::completed("ping", 1, Some(10), 20.0))
                .await;
        }
        let before = mgr.snapshot().await;
        mgr.reset_daily_stats().await;

        // archived snapshot retrievable under the prior date key
        let archived = repo.daily.lock().await.get(&before.date).cloned().unwrap();
        assert_eq!(archived.total_commands, 5);

        // counters reflect only post-reset calls
        mgr.update_command_stats(&CommandUsageRecord::completed("help", 2, None, 8.0))
            .await;
        let (total, errors) = mgr.totals().await;
        assert_eq!(total, 1);
        assert_eq!(errors, 0);
        let snap = mgr.snapshot().await;
        assert!(snap.command_breakdown.get("ping").is_none());
    }

    #[tokio::test]
    async fn load_today_adopts_stored_counters_on_restart() {
        let (mgr, repo) = manager();

        let today = Utc::now().date_naive();
        let mut stored = DailyStats::new(today);
        stored.total_commands = 42;
        stored.command_breakdown.insert("ping".into(), 42);
        repo.daily.lock().await.insert(today, stored);

        mgr.load_today().await;
        let (total, _) = mgr.totals().await;
        assert_eq!(total, 42);

        // a live day that is ahead of the last flush is not clobbered
        for _ in 0..3 {
            mgr.update_command_stats(&CommandUsageRecord::completed("ping", 1, None, 5.0))
                .await;
        }
        mgr.load_today().await;
        let (total, _) = mgr.totals().await;
        assert_eq!(total, 45);
    }
}

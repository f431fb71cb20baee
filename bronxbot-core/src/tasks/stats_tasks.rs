// src/tasks/stats_tasks.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::stats::manager::StatsManager;
use crate::tasks::TaskBody;
use crate::Error;

/// Periodic flush of the in-memory counters to the daily/hourly documents.
pub struct StatsSaveTask {
    pub stats: Arc<StatsManager>,
}

#[async_trait]
impl TaskBody for StatsSaveTask {
    async fn run(&self) -> Result<(), Error> {
        self.stats.save_stats().await;
        Ok(())
    }
}

/// Hourly re-sync of the in-memory counters from the persisted document.
pub struct StatsReloadTask {
    pub stats: Arc<StatsManager>,
}

#[async_trait]
impl TaskBody for StatsReloadTask {
    async fn run(&self) -> Result<(), Error> {
        self.stats.load_today().await;
        Ok(())
    }
}

/// Daily archive-and-zero, scheduled at the configured UTC reset hour.
pub struct DailyResetTask {
    pub stats: Arc<StatsManager>,
}

#[async_trait]
impl TaskBody for DailyResetTask {
    async fn run(&self) -> Result<(), Error> {
        self.stats.reset_daily_stats().await;
        Ok(())
    }
}

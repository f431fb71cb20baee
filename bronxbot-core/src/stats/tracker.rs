// src/stats/tracker.rs
//
// Ingress point wiring the host framework's command-completion/error events
// into the stats manager, the event bus (persistence path) and the realtime
// dashboard feed. Also keeps bounded trailing windows for fast local
// analytics without a database round-trip.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bronxbot_common::models::CommandUsageRecord;
use tokio::sync::Mutex;

use crate::eventbus::EventBus;
use crate::stats::dashboard::DashboardManager;
use crate::stats::manager::StatsManager;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Trailing execution times kept per command.
    pub per_command_window: usize,
    /// Trailing records kept across all commands.
    pub recent_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            per_command_window: 100,
            recent_window: 1000,
        }
    }
}

#[derive(Default)]
struct Windows {
    per_command: HashMap<String, VecDeque<f64>>,
    recent: VecDeque<CommandUsageRecord>,
}

pub struct CommandTracker {
    stats: Arc<StatsManager>,
    dashboard: Arc<DashboardManager>,
    event_bus: Arc<EventBus>,
    windows: Mutex<Windows>,
    config: TrackerConfig,
}

impl CommandTracker {
    pub fn new(
        stats: Arc<StatsManager>,
        dashboard: Arc<DashboardManager>,
        event_bus: Arc<EventBus>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            stats,
            dashboard,
            event_bus,
            windows: Mutex::new(Windows::default()),
            config,
        }
    }

    pub async fn track_completion(
        &self,
        command_name: &str,
        user_id: i64,
        guild_id: Option<i64>,
        execution_time_ms: f64,
    ) {
        let record =
            CommandUsageRecord::completed(command_name, user_id, guild_id, execution_time_ms);
        self.ingest(record).await;
    }

    pub async fn track_error(
        &self,
        command_name: &str,
        user_id: i64,
        guild_id: Option<i64>,
        execution_time_ms: f64,
        error: &str,
    ) {
        let record =
            CommandUsageRecord::errored(command_name, user_id, guild_id, execution_time_ms, error);
        self.ingest(record).await;
    }

    async fn ingest(&self, record: CommandUsageRecord) {
        self.stats.update_command_stats(&record).await;

        {
            let mut windows = self.windows.lock().await;
            let times = windows
                .per_command
                .entry(record.command_name.clone())
                .or_default();
            times.push_back(record.execution_time_ms);
            while times.len() > self.config.per_command_window {
                times.pop_front();
            }

            windows.recent.push_back(record.clone());
            while windows.recent.len() > self.config.recent_window {
                windows.recent.pop_front();
            }
        }

        // Persistence goes through the bus so a slow database never blocks
        // the command path beyond the bus buffer.
        self.event_bus.publish_command(record.clone()).await;

        // Realtime dashboard ping is fire-and-forget.
        let dashboard = Arc::clone(&self.dashboard);
        tokio::spawn(async move {
            dashboard.send_realtime_command_update(&record).await;
        });
    }

    /// Average over the trailing window for one command.
    pub async fn average_execution_time_ms(&self, command_name: &str) -> Option<f64> {
        let windows = self.windows.lock().await;
        let times = windows.per_command.get(command_name)?;
        if times.is_empty() {
            return None;
        }
        Some(times.iter().sum::<f64>() / times.len() as f64)
    }

    /// Most recent records, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<CommandUsageRecord> {
        let windows = self.windows.lock().await;
        windows.recent.iter().rev().take(limit).cloned().collect()
    }
}

// src/services/owner.rs
//
// Facade behind the owner-only chat commands. The chat surface itself
// (argument parsing, embeds, confirm reactions) is host-framework glue and
// out of scope; everything here is a thin delegation over the managers.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::time::Instant;

use crate::stats::dashboard::DashboardManager;
use crate::stats::guilds::{GuildDirectory, GuildPage};
use crate::stats::manager::StatsManager;
use crate::stats::performance::{PerformanceManager, PerformanceTestReport};
use crate::tasks::TaskManager;
use crate::Error;

pub struct OwnerService {
    stats: Arc<StatsManager>,
    performance: Arc<PerformanceManager>,
    dashboard: Arc<DashboardManager>,
    guilds: Arc<GuildDirectory>,
    tasks: Arc<TaskManager>,
    started_at: Instant,
}

impl OwnerService {
    pub fn new(
        stats: Arc<StatsManager>,
        performance: Arc<PerformanceManager>,
        dashboard: Arc<DashboardManager>,
        guilds: Arc<GuildDirectory>,
        tasks: Arc<TaskManager>,
    ) -> Self {
        Self {
            stats,
            performance,
            dashboard,
            guilds,
            tasks,
            started_at: Instant::now(),
        }
    }

    /// Status/health dump for the owner `status` command.
    pub async fn status_report(&self) -> Value {
        let (total, errors) = self.stats.totals().await;
        let top = self.stats.get_top_commands(5).await;
        let sample = self.performance.latest_sample().await;
        let tasks: Vec<Value> = self
            .tasks
            .states()
            .await
            .into_iter()
            .map(|(name, state)| json!({ "task": name, "state": format!("{state:?}") }))
            .collect();

        json!({
            "uptime_seconds": self.started_at.elapsed().as_secs(),
            "total_commands_today": total,
            "errors_today": errors,
            "top_commands": top,
            "guild_count": self.guilds.guild_count().await,
            "rolling_db_latency_ms": self.performance.rolling_db_latency_ms().await,
            "latest_sample": sample,
            "tasks": tasks,
        })
    }

    /// Force an immediate comprehensive dashboard push.
    pub async fn force_dashboard_push(&self) -> Result<(), Error> {
        let daily = self.stats.snapshot().await;
        let sample = self.performance.latest_sample().await;
        let overview = self.guilds.overview(5).await;
        self.dashboard
            .send_comprehensive_stats(&daily, sample.as_ref(), &overview)
            .await
    }

    pub async fn run_performance_test(&self, samples: usize) -> Result<PerformanceTestReport, Error> {
        self.performance.run_performance_test(samples).await
    }

    /// Counter reset behind the owner's confirm step (the confirmation UI
    /// lives in the host layer).
    pub async fn reset_counters(&self) {
        self.stats.reset_daily_stats().await;
    }

    pub async fn dashboard_health(&self) -> Result<(), Error> {
        self.dashboard.check_health().await
    }

    pub async fn guild_overview(&self, page: usize, per_page: usize) -> GuildPage {
        self.guilds.page(page, per_page).await
    }

    pub async fn force_task(&self, name: &str) -> Result<(), Error> {
        self.tasks.force_run(name).await
    }
}

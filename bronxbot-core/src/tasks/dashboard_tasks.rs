// src/tasks/dashboard_tasks.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::stats::dashboard::DashboardManager;
use crate::stats::guilds::GuildDirectory;
use crate::stats::manager::StatsManager;
use crate::stats::performance::PerformanceManager;
use crate::tasks::TaskBody;
use crate::Error;

/// How many of the largest guilds ride along in the comprehensive payload.
const LARGEST_GUILDS: usize = 5;

/// Periodic comprehensive push: day snapshot + latest performance sample +
/// guild overview, in one payload.
pub struct ComprehensivePushTask {
    pub stats: Arc<StatsManager>,
    pub performance: Arc<PerformanceManager>,
    pub guilds: Arc<GuildDirectory>,
    pub dashboard: Arc<DashboardManager>,
}

#[async_trait]
impl TaskBody for ComprehensivePushTask {
    async fn run(&self) -> Result<(), Error> {
        let daily = self.stats.snapshot().await;
        let sample = self.performance.latest_sample().await;
        let overview = self.guilds.overview(LARGEST_GUILDS).await;

        self.dashboard
            .send_comprehensive_stats(&daily, sample.as_ref(), &overview)
            .await
    }
}

// src/tasks/performance_tasks.rs

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::stats::dashboard::DashboardManager;
use crate::stats::performance::PerformanceManager;
use crate::tasks::TaskBody;
use crate::Error;

/// One sampling tick: collect, persist, relay. The dashboard leg is
/// best-effort; a persistence error propagates so the loop logs it.
pub struct PerformanceSampleTask {
    pub performance: Arc<PerformanceManager>,
    pub dashboard: Arc<DashboardManager>,
}

#[async_trait]
impl TaskBody for PerformanceSampleTask {
    async fn run(&self) -> Result<(), Error> {
        let sample = self.performance.collect().await?;
        self.performance.save_sample(&sample).await?;

        if let Err(e) = self.dashboard.send_performance_update(&sample).await {
            warn!("performance dashboard push failed: {:?}", e);
        }
        Ok(())
    }
}

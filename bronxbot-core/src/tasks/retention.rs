// src/tasks/retention.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::repositories::postgres::{CommandLogRepository, PerformanceRepository};
use crate::tasks::TaskBody;
use crate::Error;

/// Retention windows for the append-only tables.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub usage_logs: Duration,
    pub error_logs: Duration,
    pub performance_logs: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            usage_logs: Duration::from_secs(14 * 86400),
            error_logs: Duration::from_secs(7 * 86400),
            performance_logs: Duration::from_secs(86400),
        }
    }
}

/// Scheduled TTL pruning of the append-only tables.
pub struct RetentionTask {
    pub command_logs: Arc<dyn CommandLogRepository>,
    pub performance: Arc<dyn PerformanceRepository>,
    pub policy: RetentionPolicy,
}

#[async_trait]
impl TaskBody for RetentionTask {
    async fn run(&self) -> Result<(), Error> {
        let logs = self
            .command_logs
            .prune(self.policy.usage_logs, self.policy.error_logs)
            .await?;
        let samples = self.performance.prune(self.policy.performance_logs).await?;

        if logs + samples > 0 {
            info!("retention pruned {} log rows, {} samples", logs, samples);
        }
        Ok(())
    }
}

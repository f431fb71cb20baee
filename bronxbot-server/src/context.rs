//! bronxbot-server/src/context.rs
//!
//! Defines the main "global" context (ServerContext) for the stats server:
//! repositories -> managers -> tracker -> task registration, all constructed
//! once and shared by reference.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use bronxbot_core::db::Database;
use bronxbot_core::eventbus::command_logger::spawn_command_logger_task;
use bronxbot_core::eventbus::EventBus;
use bronxbot_core::http::DefaultHttpClient;
use bronxbot_core::repositories::postgres::{
    PostgresCommandLogRepository, PostgresPerformanceRepository, PostgresStatsRepository,
};
use bronxbot_core::services::OwnerService;
use bronxbot_core::stats::guilds::DEFAULT_SNAPSHOT_TTL;
use bronxbot_core::stats::{
    CommandTracker, DashboardConfig, DashboardManager, FixedLatencyProbe, GuildCountSource,
    GuildDirectory, PerformanceManager, PerformanceThresholds, StatsConfig, StatsManager,
    StaticGuildProvider, TrackerConfig,
};
use bronxbot_core::tasks::dashboard_tasks::ComprehensivePushTask;
use bronxbot_core::tasks::performance_tasks::PerformanceSampleTask;
use bronxbot_core::tasks::retention::{RetentionPolicy, RetentionTask};
use bronxbot_core::tasks::stats_tasks::{DailyResetTask, StatsReloadTask, StatsSaveTask};
use bronxbot_core::tasks::{Schedule, TaskManager};
use bronxbot_core::Error;

use crate::Args;

/// Command-log batching: flush after this many buffered records...
const LOGGER_BATCH_SIZE: usize = 500;
/// ...or after this many seconds, whichever comes first.
const LOGGER_FLUSH_INTERVAL_SEC: u64 = 10;

pub struct ServerContext {
    pub db: Database,
    pub event_bus: Arc<EventBus>,
    pub stats: Arc<StatsManager>,
    pub performance: Arc<PerformanceManager>,
    pub dashboard: Arc<DashboardManager>,
    pub guilds: Arc<GuildDirectory>,
    pub tracker: Arc<CommandTracker>,
    pub tasks: Arc<TaskManager>,
    pub owner: Arc<OwnerService>,

    command_logger: JoinHandle<()>,
}

impl ServerContext {
    pub async fn new(args: &Args) -> Result<Self, Error> {
        let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| args.db_path.clone());
        let db = Database::new(&db_url).await?;
        db.migrate().await?;

        let event_bus = Arc::new(EventBus::new());

        let stats_repo = Arc::new(PostgresStatsRepository::new(db.pool().clone()));
        let command_log_repo = Arc::new(PostgresCommandLogRepository::new(db.pool().clone()));
        let performance_repo = Arc::new(PostgresPerformanceRepository::new(db.pool().clone()));

        let command_logger = spawn_command_logger_task(
            &event_bus,
            command_log_repo.as_ref().clone(),
            LOGGER_BATCH_SIZE,
            LOGGER_FLUSH_INTERVAL_SEC,
        );

        let stats = Arc::new(StatsManager::new(stats_repo, StatsConfig::default()));
        stats.load_today().await;

        // The live gateway cache plugs in through GuildProvider; standalone
        // runs start with an empty static provider.
        let provider = Arc::new(StaticGuildProvider::default());
        let guilds = Arc::new(GuildDirectory::new(provider, DEFAULT_SNAPSHOT_TTL));

        let base_url = if args.dev {
            args.local_dashboard_url.clone()
        } else {
            args.dashboard_url.clone()
        };
        let dashboard = Arc::new(DashboardManager::new(
            Arc::new(DefaultHttpClient::new()),
            DashboardConfig::new(base_url),
        ));

        let performance = Arc::new(PerformanceManager::new(
            db.clone(),
            performance_repo.clone(),
            Arc::new(FixedLatencyProbe(0.0)),
            Arc::clone(&event_bus),
            Arc::clone(&guilds) as Arc<dyn GuildCountSource>,
            PerformanceThresholds::default(),
        ));

        let tracker = Arc::new(CommandTracker::new(
            Arc::clone(&stats),
            Arc::clone(&dashboard),
            Arc::clone(&event_bus),
            TrackerConfig::default(),
        ));

        let tasks = Arc::new(TaskManager::new());
        tasks
            .register(
                "stats_save",
                Schedule::Every(Duration::from_secs(args.stats_interval_secs)),
                Arc::new(StatsSaveTask {
                    stats: Arc::clone(&stats),
                }),
            )
            .await?;
        tasks
            .register(
                "stats_reload",
                Schedule::Every(Duration::from_secs(3600)),
                Arc::new(StatsReloadTask {
                    stats: Arc::clone(&stats),
                }),
            )
            .await?;
        tasks
            .register(
                "daily_reset",
                Schedule::DailyAt {
                    utc_hour: args.reset_hour,
                },
                Arc::new(DailyResetTask {
                    stats: Arc::clone(&stats),
                }),
            )
            .await?;
        tasks
            .register(
                "performance_sample",
                Schedule::Every(Duration::from_secs(args.performance_interval_secs)),
                Arc::new(PerformanceSampleTask {
                    performance: Arc::clone(&performance),
                    dashboard: Arc::clone(&dashboard),
                }),
            )
            .await?;
        tasks
            .register(
                "dashboard_push",
                Schedule::Every(Duration::from_secs(args.push_interval_secs)),
                Arc::new(ComprehensivePushTask {
                    stats: Arc::clone(&stats),
                    performance: Arc::clone(&performance),
                    guilds: Arc::clone(&guilds),
                    dashboard: Arc::clone(&dashboard),
                }),
            )
            .await?;
        tasks
            .register(
                "retention",
                Schedule::Every(Duration::from_secs(args.retention_interval_secs)),
                Arc::new(RetentionTask {
                    command_logs: command_log_repo,
                    performance: performance_repo,
                    policy: RetentionPolicy::default(),
                }),
            )
            .await?;

        let owner = Arc::new(OwnerService::new(
            Arc::clone(&stats),
            Arc::clone(&performance),
            Arc::clone(&dashboard),
            Arc::clone(&guilds),
            Arc::clone(&tasks),
        ));

        Ok(Self {
            db,
            event_bus,
            stats,
            performance,
            dashboard,
            guilds,
            tracker,
            tasks,
            owner,
            command_logger,
        })
    }

    pub async fn start_tasks(&self) -> Result<(), Error> {
        self.tasks.start_all().await
    }

    /// Orderly shutdown: flag the bus (the command logger drains and does a
    /// final flush), fire one last best-effort stats save, stop the loops.
    pub async fn shutdown(self) {
        self.event_bus.shutdown();

        let _ = tokio::time::timeout(Duration::from_secs(5), self.stats.save_stats()).await;

        self.tasks.stop_all().await;
        let _ = self.command_logger.await;
        info!("server context shut down.");
    }
}

// src/repositories/postgres/mod.rs

pub mod daily_stats;
pub mod command_logs;
pub mod performance_logs;

pub use daily_stats::{PostgresStatsRepository, StatsRepository};
pub use command_logs::{CommandLogRepository, PostgresCommandLogRepository};
pub use performance_logs::{PerformanceRepository, PostgresPerformanceRepository};

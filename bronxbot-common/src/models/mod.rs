// File: bronxbot-common/src/models/mod.rs
pub mod stats;
pub mod performance;
pub mod guild;

pub use stats::{hour_bucket, CommandUsageRecord, DailyStats, HourlyStats, TopEntry, TOP_LIST_CAP};
pub use performance::{AlertCategory, AlertLevel, PerformanceAlert, PerformanceSample};
pub use guild::GuildSnapshot;

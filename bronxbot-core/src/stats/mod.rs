// src/stats/mod.rs

pub mod manager;
pub mod performance;
pub mod dashboard;
pub mod guilds;
pub mod tracker;

pub use manager::{StatsConfig, StatsManager};
pub use performance::{
    AlertGate, FixedLatencyProbe, GuildCountSource, LatencyProbe, PerformanceManager,
    PerformanceTestReport, PerformanceThresholds,
};
pub use dashboard::{DashboardConfig, DashboardManager};
pub use guilds::{GuildDirectory, GuildOverview, GuildPage, GuildProvider, StaticGuildProvider};
pub use tracker::{CommandTracker, TrackerConfig};

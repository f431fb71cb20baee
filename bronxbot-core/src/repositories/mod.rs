// src/repositories/mod.rs

pub mod postgres;

pub use postgres::{
    CommandLogRepository, PerformanceRepository, PostgresCommandLogRepository,
    PostgresPerformanceRepository, PostgresStatsRepository, StatsRepository,
};

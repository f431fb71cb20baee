// File: bronxbot-common/src/models/performance.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sampling tick of host/bot health. Ephemeral beyond its retention
/// window; only the threshold alerts derived from it carry state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub cpu_usage_pct: f32,
    pub memory_usage_pct: f32,
    /// Gateway round-trip latency as reported by the host framework.
    pub latency_ms: f64,
    /// Round-trip time of a `SELECT 1` against the database.
    pub database_latency_ms: f64,
    pub active_guild_count: i64,
    pub uptime_seconds: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Cpu,
    Memory,
    Latency,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Cpu => "cpu",
            AlertCategory::Memory => "memory",
            AlertCategory::Latency => "latency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

/// A threshold breach that passed the per-category cooldown gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceAlert {
    pub category: AlertCategory,
    pub level: AlertLevel,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

impl PerformanceAlert {
    pub fn new(category: AlertCategory, level: AlertLevel, value: f64, threshold: f64) -> Self {
        let message = format!(
            "{} {}: {:.1} exceeds threshold {:.1}",
            category.as_str(),
            level.as_str(),
            value,
            threshold
        );
        Self {
            category,
            level,
            value,
            threshold,
            message,
            fired_at: Utc::now(),
        }
    }
}

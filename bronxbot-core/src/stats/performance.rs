// src/stats/performance.rs
//
// Samples host CPU/memory, gateway latency and a lightweight database ping;
// evaluates threshold alerts with a per-category cooldown; persists samples.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bronxbot_common::models::{AlertCategory, AlertLevel, PerformanceAlert, PerformanceSample};
use chrono::{DateTime, Utc};
use sysinfo::System;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::db::Database;
use crate::eventbus::{BotEvent, EventBus};
use crate::repositories::postgres::PerformanceRepository;
use crate::Error;

/// Warning/critical thresholds per category, plus the shared alert cooldown.
/// Thresholds are evaluated on every sample; alerts are rate-limited so a
/// sustained breach does not turn into a notification storm.
#[derive(Debug, Clone)]
pub struct PerformanceThresholds {
    pub cpu_warning: f32,
    pub cpu_critical: f32,
    pub memory_warning: f32,
    pub memory_critical: f32,
    pub latency_warning_ms: f64,
    pub latency_critical_ms: f64,
    pub alert_cooldown: Duration,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 70.0,
            cpu_critical: 85.0,
            memory_warning: 75.0,
            memory_critical: 90.0,
            latency_warning_ms: 500.0,
            latency_critical_ms: 1000.0,
            alert_cooldown: Duration::from_secs(1800),
        }
    }
}

/// Per-category debounce: an alert fires at most once per cooldown window,
/// regardless of how many samples stay above threshold.
pub struct AlertGate {
    cooldown: chrono::Duration,
    last_fired: HashMap<AlertCategory, DateTime<Utc>>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: chrono::Duration::from_std(cooldown)
                .unwrap_or_else(|_| chrono::Duration::seconds(1800)),
            last_fired: HashMap::new(),
        }
    }

    pub fn should_fire(&mut self, category: AlertCategory, now: DateTime<Utc>) -> bool {
        match self.last_fired.get(&category) {
            Some(last) if now - *last < self.cooldown => false,
            _ => {
                self.last_fired.insert(category, now);
                true
            }
        }
    }
}

/// Gateway round-trip latency as seen by the host framework. Out of scope
/// here, so it plugs in through a trait; the fixed probe serves tests and
/// standalone runs.
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    async fn gateway_latency_ms(&self) -> Option<f64>;
}

pub struct FixedLatencyProbe(pub f64);

#[async_trait]
impl LatencyProbe for FixedLatencyProbe {
    async fn gateway_latency_ms(&self) -> Option<f64> {
        Some(self.0)
    }
}

/// Summary returned by the owner-facing performance test.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PerformanceTestReport {
    pub samples: usize,
    pub cpu_avg_pct: f32,
    pub memory_avg_pct: f32,
    pub db_latency_min_ms: f64,
    pub db_latency_avg_ms: f64,
    pub db_latency_max_ms: f64,
}

/// How many trailing database latencies feed the rolling average.
const DB_LATENCY_WINDOW: usize = 10;

pub struct PerformanceManager {
    db: Database,
    repo: Arc<dyn PerformanceRepository>,
    probe: Arc<dyn LatencyProbe>,
    event_bus: Arc<EventBus>,
    thresholds: PerformanceThresholds,
    guild_count: Arc<dyn GuildCountSource>,
    system: Mutex<System>,
    gate: Mutex<AlertGate>,
    db_latencies: Mutex<VecDeque<f64>>,
    latest: Mutex<Option<PerformanceSample>>,
    started_at: Instant,
    db_ping_timeout: Duration,
}

/// Only the active guild count is needed here; the directory implements it.
#[async_trait]
pub trait GuildCountSource: Send + Sync {
    async fn active_guild_count(&self) -> i64;
}

#[async_trait]
impl GuildCountSource for super::guilds::GuildDirectory {
    async fn active_guild_count(&self) -> i64 {
        self.guild_count().await as i64
    }
}

impl PerformanceManager {
    pub fn new(
        db: Database,
        repo: Arc<dyn PerformanceRepository>,
        probe: Arc<dyn LatencyProbe>,
        event_bus: Arc<EventBus>,
        guild_count: Arc<dyn GuildCountSource>,
        thresholds: PerformanceThresholds,
    ) -> Self {
        let gate = AlertGate::new(thresholds.alert_cooldown);
        // cpu usage is a delta between refreshes, so take a baseline reading
        // now; otherwise the first sample reports ~0%
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            db,
            repo,
            probe,
            event_bus,
            thresholds,
            guild_count,
            system: Mutex::new(system),
            gate: Mutex::new(gate),
            db_latencies: Mutex::new(VecDeque::with_capacity(DB_LATENCY_WINDOW)),
            latest: Mutex::new(None),
            started_at: Instant::now(),
            db_ping_timeout: Duration::from_secs(5),
        }
    }

    /// Gather one sample. The database ping is bounded by a timeout; a
    /// failed or timed-out ping records the timeout as the latency rather
    /// than failing the whole sample.
    pub async fn collect(&self) -> Result<PerformanceSample, Error> {
        let (cpu, memory) = {
            let mut system = self.system.lock().await;
            read_host_metrics(&mut system)
        };

        let started = Instant::now();
        let db_latency_ms = match tokio::time::timeout(self.db_ping_timeout, self.db.ping()).await
        {
            Ok(Ok(())) => started.elapsed().as_secs_f64() * 1000.0,
            Ok(Err(e)) => {
                warn!("database ping failed: {:?}", e);
                self.db_ping_timeout.as_secs_f64() * 1000.0
            }
            Err(_) => {
                warn!("database ping timed out");
                self.db_ping_timeout.as_secs_f64() * 1000.0
            }
        };

        {
            let mut window = self.db_latencies.lock().await;
            window.push_back(db_latency_ms);
            while window.len() > DB_LATENCY_WINDOW {
                window.pop_front();
            }
        }

        let latency_ms = self.probe.gateway_latency_ms().await.unwrap_or(0.0);
        let sample = PerformanceSample {
            cpu_usage_pct: cpu,
            memory_usage_pct: memory,
            latency_ms,
            database_latency_ms: db_latency_ms,
            active_guild_count: self.guild_count.active_guild_count().await,
            uptime_seconds: self.started_at.elapsed().as_secs() as i64,
            timestamp: Utc::now(),
        };

        self.fire_alerts(&sample).await;
        *self.latest.lock().await = Some(sample.clone());
        Ok(sample)
    }

    /// Rolling average of the trailing database latencies.
    pub async fn rolling_db_latency_ms(&self) -> Option<f64> {
        let window = self.db_latencies.lock().await;
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }

    pub async fn latest_sample(&self) -> Option<PerformanceSample> {
        self.latest.lock().await.clone()
    }

    pub async fn save_sample(&self, sample: &PerformanceSample) -> Result<(), Error> {
        self.repo.insert_sample(sample).await
    }

    async fn fire_alerts(&self, sample: &PerformanceSample) {
        let breaches = classify(&self.thresholds, sample);
        if breaches.is_empty() {
            return;
        }

        let now = Utc::now();
        let mut gate = self.gate.lock().await;
        for alert in breaches {
            if gate.should_fire(alert.category, now) {
                info!("performance alert: {}", alert.message);
                self.event_bus
                    .publish(BotEvent::PerformanceAlert(alert))
                    .await;
            }
        }
    }

    /// Owner-facing: collect `n` back-to-back samples and summarize.
    pub async fn run_performance_test(&self, n: usize) -> Result<PerformanceTestReport, Error> {
        let n = n.clamp(1, 20);
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            samples.push(self.collect().await?);
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        let count = samples.len();
        let db: Vec<f64> = samples.iter().map(|s| s.database_latency_ms).collect();
        Ok(PerformanceTestReport {
            samples: count,
            cpu_avg_pct: samples.iter().map(|s| s.cpu_usage_pct).sum::<f32>() / count as f32,
            memory_avg_pct: samples.iter().map(|s| s.memory_usage_pct).sum::<f32>()
                / count as f32,
            db_latency_min_ms: db.iter().cloned().fold(f64::INFINITY, f64::min),
            db_latency_avg_ms: db.iter().sum::<f64>() / count as f64,
            db_latency_max_ms: db.iter().cloned().fold(0.0, f64::max),
        })
    }
}

/// Refresh and read host CPU% and memory%. Expects a `System` that has had
/// at least one prior cpu refresh.
fn read_host_metrics(system: &mut System) -> (f32, f32) {
    system.refresh_cpu_usage();
    system.refresh_memory();
    let cpu = system.global_cpu_usage();
    let total = system.total_memory();
    let memory = if total > 0 {
        (system.used_memory() as f32 / total as f32) * 100.0
    } else {
        0.0
    };
    (cpu, memory)
}

/// Pure threshold check: critical wins over warning within a category.
pub fn classify(
    thresholds: &PerformanceThresholds,
    sample: &PerformanceSample,
) -> Vec<PerformanceAlert> {
    let mut alerts = Vec::new();

    let checks: [(AlertCategory, f64, f64, f64); 3] = [
        (
            AlertCategory::Cpu,
            sample.cpu_usage_pct as f64,
            thresholds.cpu_warning as f64,
            thresholds.cpu_critical as f64,
        ),
        (
            AlertCategory::Memory,
            sample.memory_usage_pct as f64,
            thresholds.memory_warning as f64,
            thresholds.memory_critical as f64,
        ),
        (
            AlertCategory::Latency,
            sample.latency_ms,
            thresholds.latency_warning_ms,
            thresholds.latency_critical_ms,
        ),
    ];

    for (category, value, warning, critical) in checks {
        if value >= critical {
            alerts.push(PerformanceAlert::new(
                category,
                AlertLevel::Critical,
                value,
                critical,
            ));
        } else if value >= warning {
            alerts.push(PerformanceAlert::new(
                category,
                AlertLevel::Warning,
                value,
                warning,
            ));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::guilds::{GuildDirectory, StaticGuildProvider};
    use bronxbot_common::models::GuildSnapshot;

    fn sample(cpu: f32, memory: f32, latency: f64) -> PerformanceSample {
        PerformanceSample {
            cpu_usage_pct: cpu,
            memory_usage_pct: memory,
            latency_ms: latency,
            database_latency_ms: 5.0,
            active_guild_count: 3,
            uptime_seconds: 60,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn classify_picks_levels() {
        let thresholds = PerformanceThresholds::default();

        assert!(classify(&thresholds, &sample(10.0, 10.0, 10.0)).is_empty());

        let alerts = classify(&thresholds, &sample(90.0, 80.0, 10.0));
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].category, AlertCategory::Cpu);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[1].category, AlertCategory::Memory);
        assert_eq!(alerts[1].level, AlertLevel::Warning);
    }

    #[test]
    fn gate_fires_once_per_cooldown_window() {
        let mut gate = AlertGate::new(Duration::from_secs(1800));
        let t0 = Utc::now();

        assert!(gate.should_fire(AlertCategory::Cpu, t0));
        // still above threshold on later samples, but inside the window
        assert!(!gate.should_fire(AlertCategory::Cpu, t0 + chrono::Duration::seconds(60)));
        assert!(!gate.should_fire(AlertCategory::Cpu, t0 + chrono::Duration::seconds(1799)));
        // another category is independent
        assert!(gate.should_fire(AlertCategory::Memory, t0));
        // window elapsed
        assert!(gate.should_fire(AlertCategory::Cpu, t0 + chrono::Duration::seconds(1800)));
    }

    #[test]
    fn host_metrics_sane_after_baseline_refresh() {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();

        let (cpu, memory) = read_host_metrics(&mut system);
        assert!(cpu >= 0.0);
        assert!(memory > 0.0, "memory {memory}");
        assert!((0.0..=100.0).contains(&memory));
    }

    #[tokio::test]
    async fn guild_directory_counts_through_trait_object() {
        let dir = Arc::new(GuildDirectory::new(
            Arc::new(StaticGuildProvider::new(vec![
                GuildSnapshot::new(1, "alpha", 100),
                GuildSnapshot::new(2, "beta", 300),
            ])),
            Duration::from_secs(60),
        ));

        // the sampler only sees the directory as a count source
        let source = Arc::clone(&dir) as Arc<dyn GuildCountSource>;
        assert_eq!(source.active_guild_count().await, 2);
    }
}

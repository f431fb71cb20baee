// src/stats/dashboard.rs
//
// Relays aggregated stats and performance data to the external HTTP
// dashboard. The dashboard being unreachable never affects command
// processing: every failure path here is logged and swallowed by callers at
// the task boundary.

use std::sync::Arc;
use std::time::Duration;

use bronxbot_common::models::{CommandUsageRecord, DailyStats, PerformanceSample};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::http::HttpClient;
use crate::stats::guilds::GuildOverview;
use crate::Error;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Total attempts for retryable requests.
    pub max_retries: u32,
    /// Retry delay is `backoff_base * 2^attempt`.
    pub backoff_base: Duration,
    /// Client-side gate for realtime updates: at most one per interval,
    /// excess updates are dropped, not queued.
    pub realtime_min_interval: Duration,
}

impl DashboardConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(8),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            realtime_min_interval: Duration::from_secs(1),
        }
    }
}

pub struct DashboardManager {
    http: Arc<dyn HttpClient>,
    config: DashboardConfig,
    last_realtime: Mutex<Option<Instant>>,
}

impl DashboardManager {
    pub fn new(http: Arc<dyn HttpClient>, config: DashboardConfig) -> Self {
        Self {
            http,
            config,
            last_realtime: Mutex::new(None),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// POST a JSON payload. With `retry`, up to `max_retries` total attempts
    /// with exponential backoff; without, one attempt. Non-2xx counts as
    /// failure. Duplicate delivery on retry is tolerated (the receiver
    /// upserts), so no idempotency key is attached.
    pub async fn send_api_request(
        &self,
        endpoint: &str,
        payload: &Value,
        retry: bool,
    ) -> Result<(), Error> {
        let url = self.url(endpoint);
        let attempts = if retry { self.config.max_retries.max(1) } else { 1 };
        let mut last_err = Error::Dashboard(format!("no attempts made for {endpoint}"));

        for attempt in 0..attempts {
            match self
                .http
                .post_json(url.clone(), payload.clone(), self.config.timeout)
                .await
            {
                Ok(resp) if resp.is_success() => return Ok(()),
                Ok(resp) => {
                    warn!(
                        "dashboard {} returned HTTP {} (attempt {}/{})",
                        endpoint,
                        resp.status,
                        attempt + 1,
                        attempts
                    );
                    last_err =
                        Error::Dashboard(format!("{} returned HTTP {}", endpoint, resp.status));
                }
                Err(e) => {
                    warn!(
                        "dashboard {} request failed (attempt {}/{}): {:?}",
                        endpoint,
                        attempt + 1,
                        attempts,
                        e
                    );
                    last_err = e;
                }
            }

            if attempt + 1 < attempts {
                sleep(self.config.backoff_base * 2u32.pow(attempt)).await;
            }
        }

        Err(last_err)
    }

    /// Fire-and-forget per-command event. Rate-limited client-side; updates
    /// beyond one per interval are silently dropped.
    pub async fn send_realtime_command_update(&self, record: &CommandUsageRecord) {
        {
            let mut last = self.last_realtime.lock().await;
            if let Some(prev) = *last {
                if prev.elapsed() < self.config.realtime_min_interval {
                    debug!("realtime update dropped by rate gate");
                    return;
                }
            }
            *last = Some(Instant::now());
        }

        let payload = json!({
            "command": record.command_name,
            "user_id": record.user_id,
            "guild_id": record.guild_id,
            "execution_time_ms": record.execution_time_ms,
            "success": record.success,
            "timestamp": record.timestamp,
        });

        if let Err(e) = self
            .send_api_request("/api/stats/realtime", &payload, false)
            .await
        {
            debug!("realtime update failed: {:?}", e);
        }
    }

    /// Combined payload: day counters, top lists, latest performance sample,
    /// guild overview.
    pub async fn send_comprehensive_stats(
        &self,
        daily: &DailyStats,
        performance: Option<&PerformanceSample>,
        guilds: &GuildOverview,
    ) -> Result<(), Error> {
        let payload = json!({
            "date": daily.date,
            "total_commands": daily.total_commands,
            "errors": daily.errors,
            "command_breakdown": daily.command_breakdown,
            "hourly_usage": daily.hourly_usage,
            "top_commands": daily.top_commands(bronxbot_common::models::TOP_LIST_CAP),
            "top_users": daily.top_users(bronxbot_common::models::TOP_LIST_CAP),
            "top_guilds": daily.top_guilds(bronxbot_common::models::TOP_LIST_CAP),
            "performance": performance,
            "guilds": guilds,
        });

        self.send_api_request("/api/stats", &payload, true).await
    }

    pub async fn send_performance_update(
        &self,
        sample: &PerformanceSample,
    ) -> Result<(), Error> {
        let payload = serde_json::to_value(sample)?;
        self.send_api_request("/api/stats/performance", &payload, true)
            .await
    }

    /// Connectivity probe.
    pub async fn check_health(&self) -> Result<(), Error> {
        self.send_api_request("/api/health", &json!({"source": "bronxbot"}), false)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpClient};

    fn config() -> DashboardConfig {
        let mut cfg = DashboardConfig::new("http://dash.local");
        // keep retry tests fast; the 2^attempt shape is unchanged
        cfg.backoff_base = Duration::from_millis(1);
        cfg
    }

    #[tokio::test]
    async fn retry_attempts_exactly_max_retries_on_500() {
        let mut http = MockHttpClient::new();
        http.expect_post_json()
            .times(3)
            .returning(|_, _, _| {
                Ok(HttpResponse {
                    status: 500,
                    body: "".into(),
                })
            });

        let mgr = DashboardManager::new(Arc::new(http), config());
        let result = mgr
            .send_api_request("/api/stats", &json!({"x": 1}), true)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn backoff_delays_scale_with_attempt() {
        let mut http = MockHttpClient::new();
        http.expect_post_json()
            .times(3)
            .returning(|_, _, _| {
                Ok(HttpResponse {
                    status: 500,
                    body: "".into(),
                })
            });

        let mut cfg = DashboardConfig::new("http://dash.local");
        cfg.backoff_base = Duration::from_millis(100);
        let mgr = DashboardManager::new(Arc::new(http), cfg);

        let started = Instant::now();
        let result = mgr.send_api_request("/api/stats", &json!({}), true).await;
        assert!(result.is_err());

        // two sleeps between three attempts: 100ms * 2^0 + 100ms * 2^1
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(900), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn no_retry_when_disabled() {
        let mut http = MockHttpClient::new();
        http.expect_post_json()
            .times(1)
            .returning(|_, _, _| {
                Ok(HttpResponse {
                    status: 503,
                    body: "".into(),
                })
            });

        let mgr = DashboardManager::new(Arc::new(http), config());
        let result = mgr
            .send_api_request("/api/stats/realtime", &json!({}), false)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stops_retrying_after_first_success() {
        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_post_json()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(HttpResponse {
                    status: 500,
                    body: "".into(),
                })
            });
        http.expect_post_json()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: "ok".into(),
                })
            });

        let mgr = DashboardManager::new(Arc::new(http), config());
        let result = mgr.send_api_request("/api/stats", &json!({}), true).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn realtime_updates_are_rate_gated() {
        let mut http = MockHttpClient::new();
        // two rapid updates => only one outbound call
        http.expect_post_json()
            .times(1)
            .returning(|_, _, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: "".into(),
                })
            });

        let mgr = DashboardManager::new(Arc::new(http), config());
        let rec = CommandUsageRecord::completed("ping", 1, Some(10), 5.0);
        mgr.send_realtime_command_update(&rec).await;
        mgr.send_realtime_command_update(&rec).await;
    }

    #[tokio::test]
    async fn url_joins_without_double_slash() {
        let mut http = MockHttpClient::new();
        http.expect_post_json()
            .withf(|url, _, _| url.as_str() == "http://dash.local/api/health")
            .times(1)
            .returning(|_, _, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: "".into(),
                })
            });

        let mut cfg = config();
        cfg.base_url = "http://dash.local/".into();
        let mgr = DashboardManager::new(Arc::new(http), cfg);
        assert!(mgr.check_health().await.is_ok());
    }
}

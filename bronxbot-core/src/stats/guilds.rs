// src/stats/guilds.rs
//
// Read-side helper over the live guild cache. The gateway itself is out of
// scope; it plugs in through `GuildProvider`. Snapshots are cached with a
// short TTL so a burst of owner commands does not walk thousands of guilds
// repeatedly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bronxbot_common::models::GuildSnapshot;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Source of the flattened guild list. Implemented by the host over its
/// gateway cache; `StaticGuildProvider` serves tests and standalone runs.
#[async_trait]
pub trait GuildProvider: Send + Sync {
    async fn guilds(&self) -> Vec<GuildSnapshot>;
}

#[derive(Default)]
pub struct StaticGuildProvider {
    guilds: Mutex<Vec<GuildSnapshot>>,
}

impl StaticGuildProvider {
    pub fn new(guilds: Vec<GuildSnapshot>) -> Self {
        Self {
            guilds: Mutex::new(guilds),
        }
    }

    pub async fn set(&self, guilds: Vec<GuildSnapshot>) {
        *self.guilds.lock().await = guilds;
    }
}

#[async_trait]
impl GuildProvider for StaticGuildProvider {
    async fn guilds(&self) -> Vec<GuildSnapshot> {
        self.guilds.lock().await.clone()
    }
}

/// Aggregate view used in dashboard payloads and the owner status report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GuildOverview {
    pub total_guilds: usize,
    pub total_members: i64,
    pub largest: Vec<GuildSnapshot>,
}

/// One page of a guild listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GuildPage {
    pub entries: Vec<GuildSnapshot>,
    pub page: usize,
    pub total_pages: usize,
    pub total_guilds: usize,
}

struct CachedSnapshot {
    taken_at: Instant,
    guilds: Arc<Vec<GuildSnapshot>>,
}

pub struct GuildDirectory {
    provider: Arc<dyn GuildProvider>,
    ttl: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
}

/// Default snapshot TTL (15 minutes).
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(15 * 60);

impl GuildDirectory {
    pub fn new(provider: Arc<dyn GuildProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Current snapshot, recomputed from the provider when the cache is
    /// older than the TTL.
    pub async fn snapshot(&self) -> Arc<Vec<GuildSnapshot>> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.taken_at.elapsed() < self.ttl {
                return Arc::clone(&cached.guilds);
            }
        }

        let guilds = Arc::new(self.provider.guilds().await);
        *cache = Some(CachedSnapshot {
            taken_at: Instant::now(),
            guilds: Arc::clone(&guilds),
        });
        guilds
    }

    /// Drop the cached snapshot so the next read recomputes.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    pub async fn guild_count(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn member_total(&self) -> i64 {
        self.snapshot().await.iter().map(|g| g.member_count).sum()
    }

    pub async fn overview(&self, largest_n: usize) -> GuildOverview {
        let snapshot = self.snapshot().await;
        let mut sorted: Vec<GuildSnapshot> = snapshot.as_ref().clone();
        sorted.sort_by(|a, b| b.member_count.cmp(&a.member_count));
        sorted.truncate(largest_n);
        GuildOverview {
            total_guilds: snapshot.len(),
            total_members: snapshot.iter().map(|g| g.member_count).sum(),
            largest: sorted,
        }
    }

    /// Page numbers are 1-based; out-of-range pages return an empty page
    /// rather than an error.
    pub async fn page(&self, page: usize, per_page: usize) -> GuildPage {
        let snapshot = self.snapshot().await;
        let per_page = per_page.max(1);
        let total_guilds = snapshot.len();
        let total_pages = total_guilds.div_ceil(per_page).max(1);
        let page = page.max(1);

        let entries = snapshot
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect();

        GuildPage {
            entries,
            page,
            total_pages,
            total_guilds,
        }
    }
}

// File: bronxbot-common/src/models/guild.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flattened, read-only view of one guild from the live gateway cache.
/// Never persisted on its own; recomputed on demand behind a short TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildSnapshot {
    pub guild_id: i64,
    pub name: String,
    pub member_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl GuildSnapshot {
    pub fn new(guild_id: i64, name: impl Into<String>, member_count: i64) -> Self {
        Self {
            guild_id,
            name: name.into(),
            member_count,
            created_at: None,
        }
    }
}

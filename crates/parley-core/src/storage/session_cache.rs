//! Advisory per-conversation cache
//!
//! Holds a short summary, the files last supplied, and the last model for a
//! continuation id. It is only ever a hint; the thread store stays the source
//! of truth.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::error::StoreResult;
use crate::config::ServerConfig;

/// Cached hints for one continuation id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCacheEntry {
    pub summary: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_model: Option<String>,
}

/// Best-effort key/value cache keyed by continuation id
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<SessionCacheEntry>>;

    async fn set(&self, key: &str, entry: SessionCacheEntry) -> StoreResult<()>;
}

/// In-process session cache with its own TTL
#[derive(Debug)]
pub struct MemorySessionCache {
    entries: RwLock<HashMap<String, (SessionCacheEntry, DateTime<Utc>)>>,
    ttl: Duration,
}

impl MemorySessionCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(1)),
        }
    }

    /// Cache whose entries live for `session_cache_ttl_secs`
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(std::time::Duration::from_secs(config.session_cache_ttl_secs))
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(&self, key: &str) -> StoreResult<Option<SessionCacheEntry>> {
        let now = Utc::now();
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(entry, _)| entry.clone()))
    }

    async fn set(&self, key: &str, entry: SessionCacheEntry) -> StoreResult<()> {
        let expires_at = Utc::now() + self.ttl;
        let mut entries = self.entries.write();
        entries.retain(|_, (_, exp)| Utc::now() < *exp);
        entries.insert(key.to_string(), (entry, expires_at));
        Ok(())
    }
}

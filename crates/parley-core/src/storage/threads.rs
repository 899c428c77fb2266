//! Conversation thread store
//!
//! The store owns every `ThreadContext`. Turns are append-only; a thread past
//! its TTL reads as absent and refuses further turns. Reaching the turn
//! ceiling makes `add_turn` return `false` without deleting anything.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::StoreResult;
use crate::config::ServerConfig;
use crate::types::{ConversationTurn, ThreadContext};

/// Durable keyed store of conversation threads
///
/// Implementations must be safe for concurrent `get`/`add_turn` from many
/// in-flight calls; no cross-call locking is done by the pipeline.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Fetch a live thread; unknown, malformed, or expired ids yield `None`
    async fn get_thread(&self, id: &str) -> StoreResult<Option<ThreadContext>>;

    /// Append a turn; `false` when the thread is gone or at its turn ceiling
    async fn add_turn(&self, id: &str, turn: ConversationTurn) -> StoreResult<bool>;

    /// Start a new thread and return its id
    async fn create_thread(
        &self,
        tool_name: &str,
        initial_context: Map<String, Value>,
        session_fingerprint: Option<String>,
    ) -> StoreResult<Uuid>;
}

/// In-process thread store with sliding TTL
#[derive(Debug)]
pub struct MemoryThreadStore {
    threads: RwLock<HashMap<Uuid, ThreadContext>>,
    ttl: Duration,
    max_turns: u32,
}

impl MemoryThreadStore {
    pub fn new(ttl: std::time::Duration, max_turns: u32) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(3)),
            max_turns,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let conversation = &config.conversation;
        Self::new(
            std::time::Duration::from_secs(conversation.thread_ttl_secs),
            conversation.max_turns,
        )
    }

    /// Drop every expired thread, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut threads = self.threads.write();
        let before = threads.len();
        threads.retain(|_, t| !t.is_expired_at(now));
        before - threads.len()
    }

    /// Number of threads held, expired or not
    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn get_thread(&self, id: &str) -> StoreResult<Option<ThreadContext>> {
        let Ok(uuid) = Uuid::parse_str(id.trim()) else {
            return Ok(None);
        };
        let now = Utc::now();
        let threads = self.threads.read();
        Ok(threads
            .get(&uuid)
            .filter(|t| !t.is_expired_at(now))
            .cloned())
    }

    async fn add_turn(&self, id: &str, turn: ConversationTurn) -> StoreResult<bool> {
        let Ok(uuid) = Uuid::parse_str(id.trim()) else {
            return Ok(false);
        };
        let now = Utc::now();
        let mut threads = self.threads.write();
        let Some(thread) = threads.get_mut(&uuid) else {
            return Ok(false);
        };
        if thread.is_expired_at(now) || thread.turns.len() >= self.max_turns as usize {
            return Ok(false);
        }
        thread.turns.push(turn);
        thread.expires_at = now + self.ttl;
        Ok(true)
    }

    async fn create_thread(
        &self,
        tool_name: &str,
        initial_context: Map<String, Value>,
        session_fingerprint: Option<String>,
    ) -> StoreResult<Uuid> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let thread = ThreadContext {
            id,
            originating_tool: tool_name.to_string(),
            turns: Vec::new(),
            initial_context,
            session_fingerprint,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.threads.write().insert(id, thread);
        Ok(id)
    }
}

//! Session persistence layer
//!
//! Responsible for storing and loading conversation records.
//! In-memory by default; Postgres when a database URL is configured.

use crate::models::ConversationRecord;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

pub mod postgres;

pub use postgres::PostgresSessionStore;

/// Trait for session persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationRecord>>;
    async fn save(&self, record: &ConversationRecord) -> Result<()>;
    async fn remove(&self, session_id: &str) -> Result<()>;

    /// Delete records last updated before `cutoff`; returns their ids.
    async fn purge_idle_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>>;
}

/// In-memory session store for development
pub struct InMemorySessionStore {
    records: Arc<RwLock<HashMap<String, ConversationRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationRecord>> {
        let records = self.records.read().await;
        Ok(records.get(session_id).cloned())
    }

    async fn save(&self, record: &ConversationRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(session_id);
        Ok(())
    }

    async fn purge_idle_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let mut records = self.records.write().await;

        let expired: Vec<String> = records
            .values()
            .filter(|record| record.updated_at < cutoff)
            .map(|record| record.session_id.clone())
            .collect();

        for id in &expired {
            records.remove(id);
        }

        Ok(expired)
    }
}

//
// ================= Lifecycle =================
//

/// Session lifecycle policy. Without an idle TTL sessions never expire.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionPolicy {
    pub idle_ttl: Option<Duration>,
}

impl SessionPolicy {
    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            idle_ttl: Some(idle_ttl),
        }
    }

    pub fn is_expired(&self, record: &ConversationRecord, now: DateTime<Utc>) -> bool {
        match self.idle_ttl {
            Some(ttl) => now - record.updated_at > ttl,
            None => false,
        }
    }

    /// Records last touched before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.idle_ttl.map(|ttl| now - ttl)
    }
}

/// One async mutex per session id; turns for the same session run one at a time.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`. Released when the guard drops.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }

    /// Drop lock entries for sessions that no longer exist. An entry that is
    /// held or awaited is kept, so a turn in flight still excludes newcomers.
    pub async fn forget(&self, session_ids: &[String]) {
        let mut locks = self.locks.lock().await;
        for id in session_ids {
            if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(id);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

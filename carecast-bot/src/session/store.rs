//! Session store backends.

use crate::util::timestamp_ms;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Per-user conversational context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Most recently extracted city for this user.
    pub last_city: Option<String>,
    /// Last update, Unix milliseconds.
    pub updated_at: u64,
}

impl Session {
    /// Create a session pointing at `city`.
    #[must_use]
    pub fn with_city(city: impl Into<String>) -> Self {
        Self {
            last_city: Some(city.into()),
            updated_at: timestamp_ms(),
        }
    }
}

/// Keyed store of [`Session`]s.
///
/// Writes for one key replace the previous value (last write wins). Distinct
/// keys never contend beyond the store's own locking.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session for `key`, if the user has one.
    async fn get(&self, key: &str) -> Option<Session>;

    /// Record `city` as the user's last city, creating the session if needed.
    async fn record_city(&self, key: &str, city: &str);

    /// Number of sessions currently held.
    async fn len(&self) -> usize;

    /// Whether the store holds no sessions.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The user's last city, or `placeholder` when there is none.
    async fn last_city_or(&self, key: &str, placeholder: &str) -> String {
        self.get(key)
            .await
            .and_then(|s| s.last_city)
            .unwrap_or_else(|| placeholder.to_string())
    }
}

/// In-memory session store.
///
/// Lives for the process lifetime. Unbounded unless a capacity is set, in
/// which case the least recently updated session is evicted to make room.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: RwLock<Slots>,
    capacity: Option<usize>,
}

/// Sessions tagged with the write sequence that last touched them.
#[derive(Debug, Default)]
struct Slots {
    sessions: HashMap<String, (u64, Session)>,
    next_seq: u64,
}

impl Slots {
    fn least_recent(&self) -> Option<String> {
        self.sessions
            .iter()
            .min_by_key(|(_, (seq, _))| *seq)
            .map(|(key, _)| key.clone())
    }
}

impl MemorySessionStore {
    /// Create an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding at most `capacity` sessions.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Slots {
                sessions: HashMap::with_capacity(capacity),
                next_seq: 0,
            }),
            capacity: Some(capacity.max(1)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Option<Session> {
        self.inner
            .read()
            .await
            .sessions
            .get(key)
            .map(|(_, session)| session.clone())
    }

    async fn record_city(&self, key: &str, city: &str) {
        let mut slots = self.inner.write().await;

        if let Some(capacity) = self.capacity
            && slots.sessions.len() >= capacity
            && !slots.sessions.contains_key(key)
            && let Some(oldest) = slots.least_recent()
        {
            slots.sessions.remove(&oldest);
            debug!(evicted = %oldest, "session store full, evicted oldest session");
        }

        let seq = slots.next_seq;
        slots.next_seq += 1;
        slots
            .sessions
            .insert(key.to_string(), (seq, Session::with_city(city)));
        debug!(key = %key, city = %city, "recorded last city");
    }

    async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_get() {
        let store = MemorySessionStore::new();
        assert!(store.is_empty().await);
        assert!(store.get("telegram:1").await.is_none());

        store.record_city("telegram:1", "Chennai").await;
        let session = store.get("telegram:1").await.unwrap();
        assert_eq!(session.last_city.as_deref(), Some("Chennai"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = MemorySessionStore::new();
        store.record_city("cli:local", "Paris").await;
        store.record_city("cli:local", "Lima").await;

        assert_eq!(store.last_city_or("cli:local", "this city").await, "Lima");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_placeholder_for_unknown_user() {
        let store = MemorySessionStore::new();
        assert_eq!(store.last_city_or("nobody", "this city").await, "this city");
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        // Back-to-back writes share a millisecond; order must still hold.
        for _ in 0..200 {
            let store = MemorySessionStore::with_capacity(2);
            store.record_city("a", "Oslo").await;
            store.record_city("b", "Rome").await;
            store.record_city("c", "Kyiv").await;

            assert_eq!(store.len().await, 2);
            assert!(store.get("a").await.is_none());
            assert_eq!(store.last_city_or("b", "this city").await, "Rome");
            assert_eq!(store.last_city_or("c", "this city").await, "Kyiv");
        }
    }

    #[tokio::test]
    async fn test_rewrite_refreshes_recency() {
        let store = MemorySessionStore::with_capacity(2);
        store.record_city("a", "Oslo").await;
        store.record_city("b", "Rome").await;
        store.record_city("a", "Bergen").await;
        store.record_city("c", "Kyiv").await;

        assert!(store.get("b").await.is_none());
        assert_eq!(store.last_city_or("a", "this city").await, "Bergen");
    }

    #[tokio::test]
    async fn test_capacity_allows_overwrite_in_place() {
        let store = MemorySessionStore::with_capacity(1);
        store.record_city("a", "Oslo").await;
        store.record_city("a", "Bergen").await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.last_city_or("a", "this city").await, "Bergen");
    }
}

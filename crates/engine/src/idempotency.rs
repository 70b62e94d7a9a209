//! Idempotency store: key → cached JSON response with TTL.
//!
//! First-writer-wins: once a key holds a live value, later writers lose.
//! Replayed requests read back the exact stored response, byte for byte.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct CachedResponse {
    value: serde_json::Value,
    expires_at: Instant,
}

/// In-process response cache keyed by caller idempotency keys.
pub struct IdempotencyStore {
    entries: Mutex<HashMap<String, CachedResponse>>,
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Stored response for `key`, unless expired.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    /// Atomic conditional set: stores the value iff no live entry exists.
    ///
    /// Returns whether this caller won the write.
    pub async fn set_if_absent(&self, key: &str, value: serde_json::Value, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => false,
            _ => {
                entries.insert(
                    key.to_string(),
                    CachedResponse {
                        value,
                        expires_at: now + ttl,
                    },
                );
                true
            }
        }
    }

    /// Drop expired entries. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of live entries (expired included until the next purge).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for IdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

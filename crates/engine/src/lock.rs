//! Named TTL locks with ownership fencing.
//!
//! `acquire` mints a token bound to the name; `release` only succeeds when
//! the stored token matches, so an expired holder cannot release a lock that
//! has since been re-acquired by someone else. Expiry is lazy: a lock past
//! its TTL is simply re-acquirable.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::EngineError;

/// Ownership token handed to a lock holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(Uuid);

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    token: LockToken,
    expires_at: Instant,
}

/// In-process mutual-exclusion service.
pub struct LockService {
    locks: Mutex<HashMap<String, LockEntry>>,
}

impl LockService {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically bind `name` to a fresh token unless a live binding exists.
    pub async fn acquire(&self, name: &str, ttl: Duration) -> Option<LockToken> {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();

        match locks.get(name) {
            Some(entry) if entry.expires_at > now => None,
            _ => {
                let token = LockToken(Uuid::new_v4());
                locks.insert(
                    name.to_string(),
                    LockEntry {
                        token,
                        expires_at: now + ttl,
                    },
                );
                Some(token)
            }
        }
    }

    /// Delete the binding iff the stored token matches (compare-and-swap).
    ///
    /// Returns whether the lock was released.
    pub async fn release(&self, name: &str, token: LockToken) -> bool {
        let mut locks = self.locks.lock().await;
        match locks.get(name) {
            Some(entry) if entry.token == token => {
                locks.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Run `body` while holding the named lock.
    ///
    /// Fails with `Conflict` when the lock is contended. The lock is released
    /// on both the success and the failure path.
    pub async fn with_lock<T, F, Fut>(
        &self,
        name: &str,
        ttl: Duration,
        body: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let token = self
            .acquire(name, ttl)
            .await
            .ok_or_else(|| EngineError::Conflict(format!("Could not acquire lock {}", name)))?;

        let result = body().await;
        self.release(name, token).await;
        result
    }

    /// Like [`with_lock`](Self::with_lock), but waits for a contended lock
    /// instead of failing, up to `wait`. Times out with `Timeout`.
    pub async fn with_lock_wait<T, F, Fut>(
        &self,
        name: &str,
        ttl: Duration,
        wait: Duration,
        body: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let deadline = Instant::now() + wait;
        let token = loop {
            if let Some(token) = self.acquire(name, ttl).await {
                break token;
            }
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout(format!(
                    "Timed out waiting for lock {}",
                    name
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        let result = body().await;
        self.release(name, token).await;
        result
    }

    /// Drop expired bindings. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();
        let before = locks.len();
        locks.retain(|_, entry| entry.expires_at > now);
        before - locks.len()
    }

    /// Number of live bindings.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for LockService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_acquire_then_contend() {
        let locks = LockService::new();
        let token = locks.acquire("ride:1", Duration::from_secs(10)).await;
        assert!(token.is_some());
        assert!(locks.acquire("ride:1", Duration::from_secs(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_release_with_wrong_token_fails() {
        let locks = LockService::new();
        let token = locks
            .acquire("ride:1", Duration::from_secs(10))
            .await
            .unwrap();

        let stranger = LockToken(Uuid::new_v4());
        assert!(!locks.release("ride:1", stranger).await);

        // Still held.
        assert!(locks.acquire("ride:1", Duration::from_secs(10)).await.is_none());
        assert!(locks.release("ride:1", token).await);
        assert!(locks.acquire("ride:1", Duration::from_secs(10)).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_lock_is_reacquirable() {
        let locks = LockService::new();
        let old = locks
            .acquire("ride:1", Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        let new = locks.acquire("ride:1", Duration::from_secs(10)).await;
        assert!(new.is_some());

        // The expired holder cannot release the new binding.
        assert!(!locks.release("ride:1", old).await);
    }

    #[tokio::test]
    async fn test_with_lock_releases_on_error() {
        let locks = LockService::new();

        let result: Result<(), EngineError> = locks
            .with_lock("ride:1", Duration::from_secs(10), || async {
                Err(EngineError::Validation("boom".into()))
            })
            .await;
        assert!(result.is_err());

        // Released despite the failure.
        assert!(locks.acquire("ride:1", Duration::from_secs(10)).await.is_some());
    }

    #[tokio::test]
    async fn test_with_lock_contention_is_conflict() {
        let locks = LockService::new();
        let _held = locks
            .acquire("ride:1", Duration::from_secs(10))
            .await
            .unwrap();

        let result: Result<(), EngineError> = locks
            .with_lock("ride:1", Duration::from_secs(10), || async { Ok(()) })
            .await;
        match result {
            Err(EngineError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_mutual_exclusion_under_concurrency() {
        let locks = Arc::new(LockService::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let result = locks
                        .with_lock("shared", Duration::from_secs(5), || {
                            let inside = Arc::clone(&inside);
                            let max_seen = Arc::clone(&max_seen);
                            async move {
                                let n = inside.fetch_add(1, Ordering::SeqCst) + 1;
                                max_seen.fetch_max(n, Ordering::SeqCst);
                                tokio::task::yield_now().await;
                                inside.fetch_sub(1, Ordering::SeqCst);
                                Ok(())
                            }
                        })
                        .await;
                    // Contention shows up as Conflict; that is expected.
                    if result.is_err() {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_lock_wait_queues_behind_holder() {
        let locks = Arc::new(LockService::new());
        let token = locks
            .acquire("ride:1", Duration::from_secs(10))
            .await
            .unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                locks
                    .with_lock_wait(
                        "ride:1",
                        Duration::from_secs(10),
                        Duration::from_secs(5),
                        || async { Ok(42) },
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(locks.release("ride:1", token).await);

        let result = waiter.await.unwrap();
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_lock_wait_times_out() {
        let locks = LockService::new();
        let _held = locks
            .acquire("ride:1", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Result<(), EngineError> = locks
            .with_lock_wait(
                "ride:1",
                Duration::from_secs(10),
                Duration::from_millis(50),
                || async { Ok(()) },
            )
            .await;
        assert!(matches!(result, Err(EngineError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let locks = LockService::new();
        locks.acquire("a", Duration::from_millis(5)).await.unwrap();
        locks.acquire("b", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(locks.purge_expired().await, 1);
        assert_eq!(locks.len().await, 1);
    }
}

use crate::application_port::{LockGuard, LockService};
use crate::domain_model::{LockKey, OwnerToken};
use crate::domain_port::KeyValueStore;
use crate::logger::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LockConfig {
    pub namespace: String,
    pub ttl: Duration,
    pub retry_backoff: Duration,
    pub retries: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            namespace: "oauth:lock".to_string(),
            ttl: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(100),
            retries: 1,
        }
    }
}

/// On contention: `retries` attempts after `retry_backoff`, then the section runs unlocked.
pub struct DistributedLockService {
    store: Arc<dyn KeyValueStore>,
    config: LockConfig,
}

impl DistributedLockService {
    pub fn new(store: Arc<dyn KeyValueStore>, config: LockConfig) -> Self {
        Self { store, config }
    }

    async fn try_acquire(&self, key: &LockKey, owner: OwnerToken) -> bool {
        match self
            .store
            .set_if_absent(
                &self.config.namespace,
                key.as_str(),
                &owner.to_string(),
                self.config.ttl,
            )
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(%key, error = %e, "lock acquire failed");
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl LockService for DistributedLockService {
    async fn acquire(&self, key: &LockKey) -> Option<LockGuard> {
        let owner = OwnerToken::new();
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_backoff).await;
            }
            if self.try_acquire(key, owner).await {
                debug!(%key, %owner, attempt, "lock acquired");
                return Some(LockGuard::distributed(key.clone(), owner));
            }
        }
        warn!(%key, "lock unavailable, running section unsynchronized");
        None
    }

    async fn release(&self, guard: LockGuard) {
        let key = guard.key();
        match self
            .store
            .delete_if_equals(&self.config.namespace, key.as_str(), &guard.owner().to_string())
            .await
        {
            Ok(true) => debug!(%key, "lock released"),
            Ok(false) => warn!(%key, "lock expired before release"),
            Err(e) => warn!(%key, error = %e, "lock release failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_port::KvError;
    use crate::infra_memory::MemoryKeyValueStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lock_over(store: Arc<dyn KeyValueStore>) -> Arc<dyn LockService> {
        Arc::new(DistributedLockService::new(store, LockConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_concurrent_caller_holds_the_lock() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let lock = lock_over(store);
        let key = LockKey::from("abc");

        let attempts = (0..8).map(|_| {
            let lock = lock.clone();
            let key = key.clone();
            tokio::spawn(async move { lock.acquire(&key).await })
        });
        let guards: Vec<_> = futures_util::future::join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(guards.iter().filter(|g| g.is_some()).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_becomes_acquirable_after_ttl() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let lock = lock_over(store);
        let key = LockKey::from("abc");

        let _abandoned = lock.acquire(&key).await.expect("first acquire");
        assert!(lock.acquire(&key).await.is_none());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(lock.acquire(&key).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_owner_release_keeps_new_owner_entry() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let lock = lock_over(store.clone());
        let key = LockKey::from("abc");

        let first = lock.acquire(&key).await.expect("first acquire");
        tokio::time::advance(Duration::from_secs(31)).await;
        let second = lock.acquire(&key).await.expect("second acquire");

        lock.release(first).await;
        let held = store.get("oauth:lock", "abc").await.unwrap();
        assert_eq!(held, Some(second.owner().to_string()));

        lock.release(second).await;
        assert!(store.get("oauth:lock", "abc").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn release_frees_lock_for_next_caller() {
        let lock = lock_over(Arc::new(MemoryKeyValueStore::new()));
        let key = LockKey::from("abc");

        let guard = lock.acquire(&key).await.unwrap();
        lock.release(guard).await;
        assert!(lock.acquire(&key).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn contended_section_still_runs_exactly_once() {
        let lock = lock_over(Arc::new(MemoryKeyValueStore::new()));
        let key = LockKey::from("abc");
        let _holder = lock.acquire(&key).await.unwrap();

        let runs = AtomicUsize::new(0);
        let counter = &runs;
        let started = tokio::time::Instant::now();
        let out = lock
            .with_lock(&key, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                42
            })
            .await;

        assert_eq!(out, 42);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        // one backoff, no more
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(100) && waited < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn section_errors_propagate_after_release() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let lock = lock_over(store.clone());
        let key = LockKey::from("abc");

        let out: Result<(), String> = lock
            .with_lock(&key, || async { Err("refresh failed".to_string()) })
            .await;

        assert_eq!(out, Err("refresh failed".to_string()));
        assert!(store.get("oauth:lock", "abc").await.unwrap().is_none());
    }

    struct UnavailableStore;

    #[async_trait::async_trait]
    impl KeyValueStore for UnavailableStore {
        async fn get(&self, _: &str, _: &str) -> Result<Option<String>, KvError> {
            Err(KvError::Transport("connection refused".into()))
        }
        async fn set(&self, _: &str, _: &str, _: &str, _: Option<Duration>) -> Result<(), KvError> {
            Err(KvError::Transport("connection refused".into()))
        }
        async fn delete(&self, _: &str, _: &str) -> Result<(), KvError> {
            Err(KvError::Transport("connection refused".into()))
        }
        async fn set_if_absent(&self, _: &str, _: &str, _: &str, _: Duration) -> Result<bool, KvError> {
            Err(KvError::Transport("connection refused".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn storage_outage_degrades_instead_of_failing() {
        let lock = lock_over(Arc::new(UnavailableStore));
        let runs = AtomicUsize::new(0);
        let counter = &runs;

        let out = lock
            .with_lock(&LockKey::from("abc"), || async move {
                counter.fetch_add(1, Ordering::SeqCst)
            })
            .await;

        assert_eq!(out, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    struct SlowDeleteStore {
        inner: MemoryKeyValueStore,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for SlowDeleteStore {
        async fn get(&self, ns: &str, key: &str) -> Result<Option<String>, KvError> {
            self.inner.get(ns, key).await
        }
        async fn set(&self, ns: &str, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
            self.inner.set(ns, key, value, ttl).await
        }
        async fn delete(&self, ns: &str, key: &str) -> Result<(), KvError> {
            tokio::time::sleep(self.delay).await;
            self.inner.delete(ns, key).await
        }
        async fn set_if_absent(&self, ns: &str, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
            self.inner.set_if_absent(ns, key, value, ttl).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_then_delete_release_can_remove_a_successor() {
        let store = Arc::new(SlowDeleteStore {
            inner: MemoryKeyValueStore::new(),
            delay: Duration::from_secs(2),
        });
        let config = LockConfig {
            ttl: Duration::from_secs(1),
            ..LockConfig::default()
        };
        let lock: Arc<dyn LockService> =
            Arc::new(DistributedLockService::new(store.clone(), config));
        let key = LockKey::from("abc");

        let first = lock.acquire(&key).await.unwrap();
        let releasing = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.release(first).await })
        };
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let second = lock.acquire(&key).await.expect("expired entry is free");
        releasing.await.unwrap();

        // The accepted risk window: the successor's entry is gone.
        assert!(store.get("oauth:lock", "abc").await.unwrap().is_none());
        drop(second);
    }
}

use crate::application_port::{LockGuard, LockService};
use crate::domain_model::LockKey;
use crate::logger::*;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct LocalLockService {
    sections: DashMap<String, Arc<Mutex<()>>>,
}

impl LocalLockService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LockService for LocalLockService {
    async fn acquire(&self, key: &LockKey) -> Option<LockGuard> {
        let mutex = self
            .sections
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();
        let guard = mutex.lock_owned().await;
        trace!(%key, "local lock acquired");
        Some(LockGuard::local(key.clone(), guard))
    }

    async fn release(&self, guard: LockGuard) {
        let key = guard.key().to_string();
        drop(guard);
        // Forget idle keys; waiters still hold a clone of the mutex.
        self.sections
            .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn sections_for_one_key_never_overlap() {
        let lock: Arc<dyn LockService> = Arc::new(LocalLockService::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks = (0..10).map(|_| {
            let lock = lock.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tokio::spawn(async move {
                lock.with_lock(&LockKey::from("abc"), move || async move {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            })
        });
        for t in futures_util::future::join_all(tasks).await {
            t.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let lock = LocalLockService::new();
        let a = lock.acquire(&LockKey::from("a")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), lock.acquire(&LockKey::from("b")))
            .await
            .expect("independent key");
        assert!(a.is_some() && b.is_some());
    }

    #[tokio::test]
    async fn idle_keys_are_forgotten() {
        let lock = LocalLockService::new();
        let guard = lock.acquire(&LockKey::from("a")).await.unwrap();
        lock.release(guard).await;
        assert!(lock.sections.is_empty());
    }
}

use crate::domain_model::{LockKey, OwnerToken};
use std::future::Future;
use tokio::sync::OwnedMutexGuard;

#[derive(Debug)]
pub struct LockGuard {
    key: LockKey,
    owner: OwnerToken,
    _local: Option<OwnedMutexGuard<()>>,
}

impl LockGuard {
    pub fn distributed(key: LockKey, owner: OwnerToken) -> Self {
        Self {
            key,
            owner,
            _local: None,
        }
    }

    pub fn local(key: LockKey, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            key,
            owner: OwnerToken::new(),
            _local: Some(guard),
        }
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn owner(&self) -> OwnerToken {
        self.owner
    }
}

/// Mutual exclusion for a named section across every running instance.
///
/// Acquisition never fails: `None` means the section runs unsynchronized.
#[async_trait::async_trait]
pub trait LockService: Send + Sync {
    async fn acquire(&self, key: &LockKey) -> Option<LockGuard>;

    /// Release failures are logged by the implementation, never surfaced.
    async fn release(&self, guard: LockGuard);
}

impl dyn LockService + '_ {
    /// Run `section` exactly once, holding the lock for `key` when it could
    /// be acquired. The lock is released after the section completes,
    /// whatever it returned. If the returned future is dropped mid-section
    /// the entry is left to expire.
    pub async fn with_lock<T, F, Fut>(&self, key: &LockKey, section: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire(key).await;
        let output = section().await;
        if let Some(guard) = guard {
            self.release(guard).await;
        }
        output
    }
}

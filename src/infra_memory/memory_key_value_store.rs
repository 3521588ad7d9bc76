use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        StoredValue {
            value: value.to_owned(),
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(namespace: &str, key: &str) -> String {
        format!("{}:{}", namespace, key)
    }

    /// Drop every expired entry. Reads already ignore them; this bounds memory.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, KvError> {
        let key = Self::key(namespace, key);
        let now = Instant::now();
        let found = self
            .entries
            .get(&key)
            .map(|stored| (stored.is_live(now), stored.value.clone()));
        match found {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                self.entries.remove_if(&key, |_, stored| !stored.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), KvError> {
        self.entries
            .insert(Self::key(namespace, key), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), KvError> {
        self.entries.remove(&Self::key(namespace, key));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let now = Instant::now();
        match self.entries.entry(Self::key(namespace, key)) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    Ok(false)
                } else {
                    occupied.insert(StoredValue::new(value, Some(ttl)));
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, Some(ttl)));
                Ok(true)
            }
        }
    }

    async fn delete_if_equals(
        &self,
        namespace: &str,
        key: &str,
        expected: &str,
    ) -> Result<bool, KvError> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(&Self::key(namespace, key), |_, stored| {
                stored.is_live(now) && stored.value == expected
            });
        Ok(removed.is_some())
    }
}

use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum KvError {
    #[error("storage transport error: {0}")]
    Transport(String),
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, KvError>;

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), KvError>;

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), KvError>;

    /// Atomically write `value` with expiry only if no live entry exists.
    async fn set_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError>;

    /// Delete the entry only if it currently holds `expected`.
    ///
    /// The default is a read followed by a delete: an entry that expires and
    /// is re-created between the two calls is deleted anyway. That window is
    /// bounded by the entry's TTL. Backends with an atomic primitive override this.
    async fn delete_if_equals(
        &self,
        namespace: &str,
        key: &str,
        expected: &str,
    ) -> Result<bool, KvError> {
        match self.get(namespace, key).await? {
            Some(current) if current == expected => {
                self.delete(namespace, key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

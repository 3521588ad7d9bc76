use crate::domain_model::CookieKey;
use crate::domain_port::{KeyValueStore, KvError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

pub struct KvRecordStore<R> {
    kv: Arc<dyn KeyValueStore>,
    namespace: String,
    ttl: Option<Duration>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for KvRecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
            namespace: self.namespace.clone(),
            ttl: self.ttl,
            _record: PhantomData,
        }
    }
}

impl<R> KvRecordStore<R>
where
    R: Serialize + DeserializeOwned,
{
    pub fn new(kv: Arc<dyn KeyValueStore>, namespace: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            kv,
            namespace: namespace.into(),
            ttl,
            _record: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn load(&self, key: &CookieKey) -> Result<Option<R>, KvError> {
        let Some(raw) = self.kv.get(&self.namespace, key.as_str()).await? else {
            return Ok(None);
        };
        let record =
            serde_json::from_str(&raw).map_err(|e| KvError::Serialization(e.to_string()))?;
        Ok(Some(record))
    }

    pub async fn save(&self, key: &CookieKey, record: &R) -> Result<(), KvError> {
        let raw = serde_json::to_string(record).map_err(|e| KvError::Serialization(e.to_string()))?;
        self.kv
            .set(&self.namespace, key.as_str(), &raw, self.ttl)
            .await
    }

    pub async fn remove(&self, key: &CookieKey) -> Result<(), KvError> {
        self.kv.delete(&self.namespace, key.as_str()).await
    }
}

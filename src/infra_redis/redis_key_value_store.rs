use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, Script};
use std::time::Duration;

const COMPARE_AND_DELETE: &str = include_str!("compare_and_delete.lua");

pub struct RedisKeyValueStore {
    conn: ConnectionManager,
    prefix: String,
    compare_and_delete: Script,
}

impl RedisKeyValueStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisKeyValueStore {
            conn,
            prefix: prefix.into(),
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        }
    }

    pub async fn connect(dsn: &str, prefix: impl Into<String>) -> Result<Self, KvError> {
        let client = redis::Client::open(dsn).map_err(transport)?;
        let conn = client.get_connection_manager().await.map_err(transport)?;
        Ok(Self::new(conn, prefix))
    }

    fn key(&self, namespace: &str, key: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}:{}", namespace, key)
        } else {
            format!("{}:{}:{}", self.prefix, namespace, key)
        }
    }
}

fn transport(e: RedisError) -> KvError {
    KvError::Transport(e.to_string())
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 0 is rejected by redis.
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait::async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, KvError> {
        let key = self.key(namespace, key);
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(&key).await.map_err(transport)?;
        Ok(value)
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), KvError> {
        let key = self.key(namespace, key);
        let mut conn = self.conn.clone();
        let _: () = match ttl {
            Some(ttl) => conn
                .pset_ex(&key, value, ttl_millis(ttl))
                .await
                .map_err(transport)?,
            None => conn.set(&key, value).await.map_err(transport)?,
        };
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), KvError> {
        let key = self.key(namespace, key);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await.map_err(transport)?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let key = self.key(namespace, key);
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(transport)?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(
        &self,
        namespace: &str,
        key: &str,
        expected: &str,
    ) -> Result<bool, KvError> {
        let key = self.key(namespace, key);
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(&key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(transport)?;
        Ok(deleted == 1)
    }
}

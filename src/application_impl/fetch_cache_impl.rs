use crate::application_port::{FetchCache, FetchError};
use crate::domain_model::*;
use crate::domain_port::{Clock, KeyValueStore, UpstreamFetcher};
use crate::logger::*;
use dashmap::DashSet;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use url::Url;

#[derive(Debug, Clone)]
pub struct FetchCacheConfig {
    pub namespace: String,
    /// Bumped to invalidate every entry at once.
    pub version: String,
    pub default_ttl: Duration,
    pub allowed_hosts: HashSet<String>,
}

impl FetchCacheConfig {
    pub fn new(allowed_hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        FetchCacheConfig {
            namespace: "fetch-cache".to_owned(),
            version: "v1".to_owned(),
            default_ttl: Duration::from_secs(300),
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.into().to_ascii_lowercase())
                .collect(),
        }
    }
}

pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        normalized.set_query(None);
    } else {
        pairs.sort();
        normalized.query_pairs_mut().clear().extend_pairs(pairs);
    }
    normalized
}

/// `<version>:<host>:<method>:<sha256(normalized url [+ body])>`
pub fn cache_key(version: &str, request: &FetchRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(&request.url).as_str().as_bytes());
    if request.method != "GET" {
        if let Some(content_type) = request.headers.get("content-type") {
            hasher.update(b"\n");
            hasher.update(content_type.as_bytes());
        }
        if let Some(body) = &request.body {
            hasher.update(b"\n");
            hasher.update(body);
        }
    }
    format!(
        "{}:{}:{}:{}",
        version,
        request.url.host_str().unwrap_or_default(),
        request.method,
        hex::encode(hasher.finalize())
    )
}

/// Stale entries stay servable for this many TTLs before storage drops them.
const RETENTION_FACTOR: u64 = 12;

// rounded up, never below one second
fn whole_secs(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis().div_ceil(1000))
        .unwrap_or(u64::MAX)
        .max(1)
}

pub struct RealFetchCache {
    kv: Arc<dyn KeyValueStore>,
    fetcher: Arc<dyn UpstreamFetcher>,
    clock: Arc<dyn Clock>,
    config: Arc<FetchCacheConfig>,
    revalidating: Arc<DashSet<String>>,
    tasks: TaskTracker,
}

impl RealFetchCache {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        fetcher: Arc<dyn UpstreamFetcher>,
        clock: Arc<dyn Clock>,
        config: FetchCacheConfig,
    ) -> Self {
        Self {
            kv,
            fetcher,
            clock,
            config: Arc::new(config),
            revalidating: Arc::new(DashSet::new()),
            tasks: TaskTracker::new(),
        }
    }

    fn check_host(&self, url: &Url) -> Result<(), FetchError> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(format!("{} has no host", url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!("unsupported scheme {}", url.scheme())));
        }
        if self.config.allowed_hosts.contains(host) {
            Ok(())
        } else {
            Err(FetchError::DisallowedHost(host.to_owned()))
        }
    }

    async fn read_entry(&self, key: &str) -> Option<CachedFetchEntry> {
        let raw = match self.kv.get(&self.config.namespace, key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(%key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(%key, error = %e, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    async fn fetch_and_store(
        kv: &dyn KeyValueStore,
        fetcher: &dyn UpstreamFetcher,
        config: &FetchCacheConfig,
        key: &str,
        request: &FetchRequest,
        cached_at: i64,
        ttl: Duration,
    ) -> Result<CachedFetchEntry, FetchError> {
        let response = fetcher.fetch(request).await?;
        let cacheable = response.is_success();
        let ttl_secs = whole_secs(ttl);
        let entry = CachedFetchEntry::from_upstream(response, cached_at, ttl_secs);
        if cacheable {
            let retention = Duration::from_secs(ttl_secs.saturating_mul(RETENTION_FACTOR));
            match serde_json::to_string(&entry) {
                Ok(raw) => {
                    if let Err(e) = kv.set(&config.namespace, key, &raw, Some(retention)).await {
                        warn!(%key, error = %e, "cache write failed");
                    }
                }
                Err(e) => warn!(%key, error = %e, "cache entry not serializable"),
            }
        } else {
            debug!(%key, status = entry.status, "not caching unsuccessful response");
        }
        Ok(entry)
    }

    /// Detached refresh of a stale entry. At most one per key is in flight
    /// on this instance; failures are logged and the stale entry stays.
    fn spawn_revalidation(&self, key: String, request: FetchRequest, ttl: Duration) {
        if !self.revalidating.insert(key.clone()) {
            trace!(%key, "revalidation already in flight");
            return;
        }
        let kv = self.kv.clone();
        let fetcher = self.fetcher.clone();
        let clock = self.clock.clone();
        let config = self.config.clone();
        let revalidating = self.revalidating.clone();
        self.tasks.spawn(async move {
            let started = clock.now_ms();
            match Self::fetch_and_store(
                kv.as_ref(),
                fetcher.as_ref(),
                &config,
                &key,
                &request,
                started,
                ttl,
            )
            .await
            {
                Ok(entry) => debug!(%key, status = entry.status, "revalidated"),
                Err(e) => warn!(%key, error = %e, "background revalidation failed"),
            }
            revalidating.remove(&key);
        });
    }

    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

#[async_trait::async_trait]
impl FetchCache for RealFetchCache {
    async fn cached_fetch(
        &self,
        request: FetchRequest,
        ttl_override: Option<Duration>,
    ) -> Result<CachedResponse, FetchError> {
        self.check_host(&request.url)?;
        let key = cache_key(&self.config.version, &request);
        let ttl = ttl_override.unwrap_or(self.config.default_ttl);
        let now = self.clock.now_ms();

        if let Some(entry) = self.read_entry(&key).await {
            if !entry.is_stale_at(now) {
                trace!(%key, "cache hit");
                return Ok(CachedResponse::from_entry(entry, false));
            }
            debug!(%key, "stale hit, revalidating in background");
            self.spawn_revalidation(key, request, ttl);
            return Ok(CachedResponse::from_entry(entry, true));
        }

        debug!(%key, "cache miss");
        let entry = Self::fetch_and_store(
            self.kv.as_ref(),
            self.fetcher.as_ref(),
            &self.config,
            &key,
            &request,
            now,
            ttl,
        )
        .await?;
        Ok(CachedResponse::from_entry(entry, false))
    }
}

use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("sessionkeep/", env!("CARGO_PKG_VERSION"));

pub struct Server {
    pub session_service: Arc<dyn SessionService>,
    pub fetch_cache: Arc<dyn FetchCache>,
    revalidations: Arc<RealFetchCache>,
    purge_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let cancel = CancellationToken::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let lock_config = LockConfig {
            ttl: Duration::from_secs(settings.lock.ttl_secs),
            retry_backoff: Duration::from_millis(settings.lock.retry_backoff_ms),
            retries: settings.lock.retries,
            ..LockConfig::default()
        };

        let mut purge_handle = None;
        let (kv, lock): (Arc<dyn KeyValueStore>, Arc<dyn LockService>) =
            match settings.storage.backend.as_str() {
                "memory" => {
                    let memory = Arc::new(MemoryKeyValueStore::new());
                    purge_handle = Some(spawn_purge(memory.clone(), cancel.clone()));
                    let store: Arc<dyn KeyValueStore> = memory;
                    let lock: Arc<dyn LockService> = Arc::new(LocalLockService::new());
                    (store, lock)
                }
                "distributed" => {
                    let redis = settings.storage.redis.as_ref().ok_or_else(|| {
                        anyhow::anyhow!("storage.redis is required for the distributed backend")
                    })?;
                    let store: Arc<dyn KeyValueStore> =
                        Arc::new(RedisKeyValueStore::connect(&redis.dsn, redis.prefix.clone()).await?);
                    let lock: Arc<dyn LockService> =
                        Arc::new(DistributedLockService::new(store.clone(), lock_config));
                    (store, lock)
                }
                other => return Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
            };
        info!(backend = %settings.storage.backend, "storage ready");

        let signer = match settings.session.secret.as_deref().map(CookieSigner::new) {
            Some(Ok(signer)) => Some(signer),
            Some(Err(e)) => {
                error!(error = %e, "login and session routes will fail");
                None
            }
            None => {
                error!("session.secret is not set, login and session routes will fail");
                None
            }
        };
        let stores = SessionStores::with_defaults(
            kv.clone(),
            signer,
            Duration::from_secs(settings.session.state_ttl_secs),
            settings.session.session_ttl_secs.map(Duration::from_secs),
            settings.session.local_dev,
        );

        let oauth_client: Arc<dyn OAuthClient> = match settings.oauth.backend.as_str() {
            "fake" => Arc::new(FakeOAuthClient::new(
                Url::parse(&settings.oauth.redirect_uri)?,
                chrono::Duration::seconds(settings.oauth.access_ttl_secs),
                clock.clone(),
            )),
            other => return Err(anyhow::anyhow!("Unknown oauth backend: {}", other)),
        };

        let restorer = SessionRestorer::new(
            oauth_client.clone(),
            lock,
            stores.session_records(),
            clock.clone(),
        );
        let session_service: Arc<dyn SessionService> =
            Arc::new(RealSessionService::new(oauth_client, stores, restorer));

        let fetcher: Arc<dyn UpstreamFetcher> = Arc::new(ReqwestFetcher::new(
            Duration::from_secs(settings.fetch_cache.timeout_secs),
            USER_AGENT,
        )?);
        let mut cache_config = FetchCacheConfig::new(settings.fetch_cache.allowed_hosts.iter().cloned());
        cache_config.version = settings.fetch_cache.version.clone();
        cache_config.default_ttl = Duration::from_secs(settings.fetch_cache.default_ttl_secs);
        let revalidations = Arc::new(RealFetchCache::new(kv, fetcher, clock, cache_config));
        let fetch_cache: Arc<dyn FetchCache> = revalidations.clone();

        info!("server started");

        Ok(Self {
            session_service,
            fetch_cache,
            revalidations,
            purge_handle: Mutex::new(purge_handle),
            cancel,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self
            .purge_handle
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("purge task stopped: {:?}", r);
        }

        self.revalidations.drain().await;
    }
}

fn spawn_purge(store: Arc<MemoryKeyValueStore>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = store.purge_expired();
                    if purged > 0 {
                        debug!(purged, "expired entries purged");
                    }
                }
            }
        }
    })
}

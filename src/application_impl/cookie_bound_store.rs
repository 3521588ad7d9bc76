use super::{CookieSigner, KvRecordStore};
use crate::application_port::SessionError;
use crate::domain_model::*;
use crate::domain_port::{CookieJar, KeyValueStore, KvError};
use crate::logger::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

pub const STATE_COOKIE: &str = "oauth:atproto:state";
pub const SESSION_COOKIE: &str = "oauth:atproto:session";
pub const STATE_NAMESPACE: &str = "oauth-atproto-state";
pub const SESSION_NAMESPACE: &str = "oauth-atproto-session";

#[derive(Debug, Clone)]
pub struct StoreLayout {
    pub namespace: String,
    pub cookie_name: String,
    pub ttl: Option<Duration>,
}

/// Records addressed through a cookie of the current HTTP exchange.
/// The cookie holds a signed opaque key; the record stays server-side.
pub struct CookieBoundStore<R> {
    records: KvRecordStore<R>,
    cookies: Arc<dyn CookieJar>,
    cookie_name: String,
    cookie_max_age: Option<Duration>,
    secure: bool,
    signer: Option<Arc<CookieSigner>>,
}

pub type AuthStateStore = CookieBoundStore<AuthStateRecord>;
pub type SessionStore = CookieBoundStore<SessionRecord>;

impl<R> CookieBoundStore<R>
where
    R: Serialize + DeserializeOwned,
{
    fn signer(&self) -> Result<&CookieSigner, SessionError> {
        self.signer
            .as_deref()
            .ok_or_else(|| SessionError::Config("session secret is not configured".into()))
    }

    pub fn cookie_key(&self) -> Result<Option<CookieKey>, SessionError> {
        let Some(value) = self.cookies.get(&self.cookie_name) else {
            return Ok(None);
        };
        let key = self.signer()?.verify(&value);
        if key.is_none() {
            debug!(cookie = %self.cookie_name, "ignoring cookie with bad signature");
        }
        Ok(key)
    }

    pub async fn get(&self) -> Result<Option<R>, SessionError> {
        Ok(self.get_with_key().await?.map(|(_, record)| record))
    }

    pub async fn get_with_key(&self) -> Result<Option<(CookieKey, R)>, SessionError> {
        let Some(key) = self.cookie_key()? else {
            return Ok(None);
        };
        match self.records.load(&key).await {
            Ok(Some(record)) => Ok(Some((key, record))),
            Ok(None) => Ok(None),
            Err(KvError::Serialization(e)) => {
                warn!(namespace = self.records.namespace(), error = %e, "unreadable record treated as absent");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set(&self, key: CookieKey, record: &R) -> Result<(), SessionError> {
        let value = self.signer()?.sign(&key);
        self.records.save(&key, record).await?;
        let mut cookie = SetCookie::session_scoped(&self.cookie_name, value, self.secure);
        if let Some(max_age) = self.cookie_max_age {
            cookie = cookie.with_max_age(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));
        }
        self.cookies.set(cookie);
        Ok(())
    }

    /// Best-effort: storage failures are logged, the cookie is always cleared.
    pub async fn del(&self) {
        match self.cookie_key() {
            Ok(Some(key)) => {
                if let Err(e) = self.records.remove(&key).await {
                    warn!(namespace = self.records.namespace(), error = %e, "record delete failed");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cannot resolve cookie key for delete"),
        }
        self.cookies
            .set(SetCookie::expired(&self.cookie_name, self.secure));
    }
}

#[derive(Clone)]
pub struct SessionStores {
    kv: Arc<dyn KeyValueStore>,
    signer: Option<Arc<CookieSigner>>,
    state: StoreLayout,
    session: StoreLayout,
    local_dev: bool,
}

impl SessionStores {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        signer: Option<CookieSigner>,
        state: StoreLayout,
        session: StoreLayout,
        local_dev: bool,
    ) -> Self {
        Self {
            kv,
            signer: signer.map(Arc::new),
            state,
            session,
            local_dev,
        }
    }

    pub fn with_defaults(
        kv: Arc<dyn KeyValueStore>,
        signer: Option<CookieSigner>,
        state_ttl: Duration,
        session_ttl: Option<Duration>,
        local_dev: bool,
    ) -> Self {
        Self::new(
            kv,
            signer,
            StoreLayout {
                namespace: STATE_NAMESPACE.to_owned(),
                cookie_name: STATE_COOKIE.to_owned(),
                ttl: Some(state_ttl),
            },
            StoreLayout {
                namespace: SESSION_NAMESPACE.to_owned(),
                cookie_name: SESSION_COOKIE.to_owned(),
                ttl: session_ttl,
            },
            local_dev,
        )
    }

    fn bind<R>(&self, layout: &StoreLayout, cookies: Arc<dyn CookieJar>) -> CookieBoundStore<R>
    where
        R: Serialize + DeserializeOwned,
    {
        CookieBoundStore {
            records: KvRecordStore::new(self.kv.clone(), layout.namespace.clone(), layout.ttl),
            cookies,
            cookie_name: layout.cookie_name.clone(),
            cookie_max_age: layout.ttl,
            secure: !self.local_dev,
            signer: self.signer.clone(),
        }
    }

    pub fn auth_state(&self, cookies: Arc<dyn CookieJar>) -> AuthStateStore {
        self.bind(&self.state, cookies)
    }

    pub fn session(&self, cookies: Arc<dyn CookieJar>) -> SessionStore {
        self.bind(&self.session, cookies)
    }

    /// Session records without a cookie context, for the refresh path.
    pub fn session_records(&self) -> KvRecordStore<SessionRecord> {
        KvRecordStore::new(
            self.kv.clone(),
            self.session.namespace.clone(),
            self.session.ttl,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_http::RequestCookies;
    use crate::infra_memory::MemoryKeyValueStore;
    use chrono::Utc;

    #[derive(Default)]
    struct CountingStore {
        inner: MemoryKeyValueStore,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl CountingStore {
        fn calls(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
        fn tick(&self) {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl KeyValueStore for CountingStore {
        async fn get(&self, ns: &str, key: &str) -> Result<Option<String>, KvError> {
            self.tick();
            self.inner.get(ns, key).await
        }
        async fn set(&self, ns: &str, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
            self.tick();
            self.inner.set(ns, key, value, ttl).await
        }
        async fn delete(&self, ns: &str, key: &str) -> Result<(), KvError> {
            self.tick();
            self.inner.delete(ns, key).await
        }
        async fn set_if_absent(&self, ns: &str, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
            self.tick();
            self.inner.set_if_absent(ns, key, value, ttl).await
        }
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _: &str, _: &str) -> Result<Option<String>, KvError> {
            Err(KvError::Transport("timeout".into()))
        }
        async fn set(&self, _: &str, _: &str, _: &str, _: Option<Duration>) -> Result<(), KvError> {
            Err(KvError::Transport("timeout".into()))
        }
        async fn delete(&self, _: &str, _: &str) -> Result<(), KvError> {
            Err(KvError::Transport("timeout".into()))
        }
        async fn set_if_absent(&self, _: &str, _: &str, _: &str, _: Duration) -> Result<bool, KvError> {
            Err(KvError::Transport("timeout".into()))
        }
    }

    fn stores(kv: Arc<dyn KeyValueStore>) -> SessionStores {
        SessionStores::with_defaults(
            kv,
            Some(CookieSigner::new("test-secret").unwrap()),
            Duration::from_secs(600),
            None,
            false,
        )
    }

    fn record(subject: &str) -> SessionRecord {
        SessionRecord {
            subject: SubjectId(subject.into()),
            tokens: TokenSet {
                access_token: "access".into(),
                refresh_token: Some("refresh".into()),
                expires_at: Utc::now(),
                scope: None,
            },
            key_material: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn set_get_del_lifecycle() {
        let jar = Arc::new(RequestCookies::default());
        let store = stores(Arc::new(MemoryKeyValueStore::new())).session(jar.clone());

        store.set(CookieKey("k1".into()), &record("did:plc:abc")).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(record("did:plc:abc")));

        store.del().await;
        assert_eq!(store.get().await.unwrap(), None);
        assert!(jar.set_cookie_headers()[0].contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn no_cookie_means_no_storage_access() {
        let kv = Arc::new(CountingStore::default());
        let store = stores(kv.clone()).session(Arc::new(RequestCookies::default()));

        assert_eq!(store.get().await.unwrap(), None);
        assert_eq!(kv.calls(), 0);
    }

    #[tokio::test]
    async fn cookie_for_evicted_record_is_not_an_error() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let stores = stores(kv.clone());
        let jar = Arc::new(RequestCookies::default());
        stores
            .session(jar.clone())
            .set(CookieKey("k1".into()), &record("did:plc:abc"))
            .await
            .unwrap();
        kv.delete(SESSION_NAMESPACE, "k1").await.unwrap();

        assert_eq!(stores.session(jar).get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn forged_cookie_is_ignored() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let serialized = serde_json::to_string(&record("did:plc:abc")).unwrap();
        kv.set(SESSION_NAMESPACE, "guess", &serialized, None).await.unwrap();

        let jar = Arc::new(RequestCookies::new([(
            SESSION_COOKIE,
            Some("guess.00ff".to_owned()),
        )]));
        assert_eq!(stores(kv).session(jar).get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn state_and_session_cookies_coexist() {
        let stores = stores(Arc::new(MemoryKeyValueStore::new()));
        let jar: Arc<RequestCookies> = Arc::new(RequestCookies::default());
        let state = AuthStateRecord {
            handle: Some("alice.test".into()),
            payload: serde_json::json!({"verifier": "v"}),
            created_at: Utc::now(),
        };

        stores.session(jar.clone()).set(CookieKey("same".into()), &record("did:plc:abc")).await.unwrap();
        stores.auth_state(jar.clone()).set(CookieKey("same".into()), &state).await.unwrap();

        assert_eq!(stores.auth_state(jar.clone()).get().await.unwrap(), Some(state));
        assert_eq!(
            stores.session(jar.clone()).get().await.unwrap(),
            Some(record("did:plc:abc"))
        );
        let headers = jar.set_cookie_headers();
        assert!(headers.iter().any(|h| h.starts_with("oauth:atproto:state=") && h.contains("Max-Age=600")));
        assert!(headers.iter().all(|h| h.contains("HttpOnly") && h.contains("Secure") && h.contains("SameSite=Lax")));
    }

    #[tokio::test]
    async fn transport_errors_propagate_on_get_but_not_on_del() {
        let signer = CookieSigner::new("test-secret").unwrap();
        let cookie = signer.sign(&CookieKey("k1".into()));
        let jar = Arc::new(RequestCookies::new([(SESSION_COOKIE, Some(cookie))]));
        let store = stores(Arc::new(BrokenStore)).session(jar.clone());

        assert!(matches!(store.get().await, Err(SessionError::Storage(_))));
        store.del().await;
        assert_eq!(jar.get(SESSION_COOKIE), None);
    }

    #[tokio::test]
    async fn missing_secret_only_matters_once_a_cookie_is_involved() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let stores = SessionStores::with_defaults(kv, None, Duration::from_secs(600), None, true);

        let anonymous = stores.session(Arc::new(RequestCookies::default()));
        assert_eq!(anonymous.get().await.unwrap(), None);

        let err = anonymous
            .set(CookieKey("k".into()), &record("did:plc:abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }
}

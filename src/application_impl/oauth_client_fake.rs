use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashSet;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Stand-in identity provider for local development and tests.
///
/// Authorization codes are `fake-code:<handle>`. Refresh tokens are single
/// use: refreshing rotates them and the old one is rejected afterwards,
/// like a real provider would.
pub struct FakeOAuthClient {
    redirect_uri: Url,
    access_ttl: chrono::Duration,
    refresh_delay: Duration,
    clock: Arc<dyn Clock>,
    revoked: DashSet<String>,
    refresh_calls: AtomicUsize,
    issued: AtomicUsize,
}

impl FakeOAuthClient {
    pub fn new(redirect_uri: Url, access_ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            redirect_uri,
            access_ttl,
            refresh_delay: Duration::ZERO,
            clock,
            revoked: DashSet::new(),
            refresh_calls: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn subject_for(handle: &str) -> SubjectId {
        let digest = Sha256::digest(handle.as_bytes());
        SubjectId(format!("did:plc:{}", &hex::encode(digest)[..24]))
    }

    fn issue(&self, subject: &SubjectId) -> TokenSet {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        TokenSet {
            access_token: format!("fake-access:{}:{}", subject, n),
            refresh_token: Some(format!("fake-refresh:{}:{}", subject, nanoid::nanoid!(12))),
            expires_at: self.clock.now() + self.access_ttl,
            scope: Some("atproto transition:generic".to_owned()),
        }
    }
}

#[async_trait::async_trait]
impl OAuthClient for FakeOAuthClient {
    async fn authorize(&self, handle: &str) -> Result<AuthorizeRequest, OAuthError> {
        let state_key = CookieKey::generate();
        let mut redirect_url = self.redirect_uri.clone();
        redirect_url
            .query_pairs_mut()
            .append_pair("code", &format!("fake-code:{}", handle))
            .append_pair("state", state_key.as_str());
        Ok(AuthorizeRequest {
            redirect_url,
            state_key,
            state: AuthStateRecord {
                handle: Some(handle.to_owned()),
                payload: serde_json::json!({ "pkce_verifier": nanoid::nanoid!(43) }),
                created_at: self.clock.now(),
            },
        })
    }

    async fn callback(
        &self,
        params: &CallbackParams,
        state: &AuthStateRecord,
    ) -> Result<SessionRecord, OAuthError> {
        let handle = params
            .code
            .strip_prefix("fake-code:")
            .ok_or_else(|| OAuthError::Rejected("unknown authorization code".into()))?;
        if state.handle.as_deref().is_some_and(|h| h != handle) {
            return Err(OAuthError::Rejected("code issued for another handle".into()));
        }
        let subject = Self::subject_for(handle);
        Ok(SessionRecord {
            tokens: self.issue(&subject),
            key_material: serde_json::json!({ "dpop_jwk": format!("fake-jwk:{}", subject) }),
            subject,
        })
    }

    async fn resume(&self, record: &SessionRecord) -> Result<LiveSession, OAuthError> {
        if record.tokens.expires_at <= self.clock.now() {
            return Err(OAuthError::Rejected("access token expired".into()));
        }
        Ok(LiveSession {
            subject: record.subject.clone(),
            access_token: record.tokens.access_token.clone(),
            expires_at: record.tokens.expires_at,
        })
    }

    async fn refresh(&self, record: &SessionRecord) -> Result<SessionRecord, OAuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        let refresh_token = record
            .tokens
            .refresh_token
            .as_ref()
            .ok_or_else(|| OAuthError::Rejected("no refresh token".into()))?;
        // single use
        if !self.revoked.insert(refresh_token.clone()) {
            return Err(OAuthError::Rejected("refresh token already used".into()));
        }
        Ok(SessionRecord {
            subject: record.subject.clone(),
            tokens: self.issue(&record.subject),
            key_material: record.key_material.clone(),
        })
    }

    async fn revoke(&self, record: &SessionRecord) -> Result<(), OAuthError> {
        if let Some(token) = &record.tokens.refresh_token {
            self.revoked.insert(token.clone());
        }
        Ok(())
    }
}

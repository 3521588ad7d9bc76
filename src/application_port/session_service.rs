use crate::domain_model::{LiveSession, SubjectId};
use crate::domain_port::{CallbackParams, CookieJar, KvError, OAuthError};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("missing or mismatched authorization state")]
    InvalidState,
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("identity provider error: {0}")]
    OAuth(String),
    #[error("authorization rejected: {0}")]
    Rejected(String),
}

impl From<KvError> for SessionError {
    fn from(err: KvError) -> Self {
        SessionError::Storage(err.to_string())
    }
}

impl From<OAuthError> for SessionError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::Rejected(reason) => SessionError::Rejected(reason),
            other => SessionError::OAuth(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    /// Start a login. Returns the provider URL to redirect the browser to.
    async fn begin_login(
        &self,
        cookies: Arc<dyn CookieJar>,
        handle: &str,
    ) -> Result<Url, SessionError>;

    async fn complete_login(
        &self,
        cookies: Arc<dyn CookieJar>,
        params: CallbackParams,
    ) -> Result<SubjectId, SessionError>;

    async fn cancel_login(&self, cookies: Arc<dyn CookieJar>) -> Result<(), SessionError>;

    /// `Ok(None)` is the anonymous steady state, not a failure.
    async fn current_session(
        &self,
        cookies: Arc<dyn CookieJar>,
    ) -> Result<Option<LiveSession>, SessionError>;

    /// Best-effort: always clears the session cookie.
    async fn logout(&self, cookies: Arc<dyn CookieJar>) -> Result<(), SessionError>;
}

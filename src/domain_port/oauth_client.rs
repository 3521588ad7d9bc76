use crate::domain_model::*;
use url::Url;

#[derive(Debug, Clone, thiserror::Error)]
pub enum OAuthError {
    /// The identity provider refused the grant or token. Not retryable.
    #[error("rejected by identity provider: {0}")]
    Rejected(String),
    #[error("identity provider unreachable: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub redirect_url: Url,
    /// Provider-chosen key the pending state is stored under.
    pub state_key: CookieKey,
    pub state: AuthStateRecord,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
    #[serde(default)]
    pub iss: Option<String>,
}

/// The identity-protocol client. Owns every cryptographic step (token
/// exchange, DPoP proofs, signing); this crate only persists what it returns.
#[async_trait::async_trait]
pub trait OAuthClient: Send + Sync {
    async fn authorize(&self, handle: &str) -> Result<AuthorizeRequest, OAuthError>;

    async fn callback(
        &self,
        params: &CallbackParams,
        state: &AuthStateRecord,
    ) -> Result<SessionRecord, OAuthError>;

    async fn resume(&self, record: &SessionRecord) -> Result<LiveSession, OAuthError>;

    /// Exchange the refresh token. The returned record replaces the old one.
    async fn refresh(&self, record: &SessionRecord) -> Result<SessionRecord, OAuthError>;

    async fn revoke(&self, record: &SessionRecord) -> Result<(), OAuthError>;
}

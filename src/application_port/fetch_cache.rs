use crate::domain_model::{CachedResponse, FetchRequest};
use crate::domain_port::UpstreamError;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("host is not allow-listed: {0}")]
    DisallowedHost(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

#[async_trait::async_trait]
pub trait FetchCache: Send + Sync {
    async fn cached_fetch(
        &self,
        request: FetchRequest,
        ttl_override: Option<Duration>,
    ) -> Result<CachedResponse, FetchError>;
}

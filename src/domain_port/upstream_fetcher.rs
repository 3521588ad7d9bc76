use crate::domain_model::{FetchRequest, UpstreamResponse};

#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream timed out")]
    Timeout,
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

#[async_trait::async_trait]
pub trait UpstreamFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<UpstreamResponse, UpstreamError>;
}

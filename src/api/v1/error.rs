use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, Reply, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(code) = err.find::<ApiErrorCode>() {
        Ok(error_reply(code.clone()))
    } else if err.is_not_found() {
        Ok(error_reply(ApiErrorCode::NotFound))
    } else if err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
    {
        Ok(error_reply(ApiErrorCode::InvalidRequest))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        Ok(error_reply(ApiErrorCode::NotFound))
    } else {
        warn!("Unhandled rejection: {:?}", err);
        Ok(error_reply(ApiErrorCode::InternalError))
    }
}

pub fn error_reply(code: ApiErrorCode) -> warp::reply::Response {
    let status = code.status();
    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    warp::reply::with_status(json, status).into_response()
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Login state is missing or expired")]
    InvalidState,
    #[error("Authorization was rejected")]
    AuthorizationRejected,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Host is not allowed")]
    DisallowedHost,
    #[error("Upstream service unavailable")]
    UpstreamUnavailable,
    #[error("Storage unavailable, try again")]
    StorageUnavailable,
    #[error("Server misconfigured")]
    Misconfigured,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidState | ApiErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::AuthorizationRejected => StatusCode::UNAUTHORIZED,
            ApiErrorCode::DisallowedHost => StatusCode::FORBIDDEN,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ApiErrorCode::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::Misconfigured | ApiErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<SessionError> for ApiErrorCode {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Config(e) => {
                error!("Configuration error: {}", e);
                ApiErrorCode::Misconfigured
            }
            SessionError::InvalidState => ApiErrorCode::InvalidState,
            SessionError::Rejected(_) => ApiErrorCode::AuthorizationRejected,
            SessionError::Storage(e) => {
                warn!("Storage error: {}", e);
                ApiErrorCode::StorageUnavailable
            }
            SessionError::OAuth(e) => {
                warn!("Identity provider error: {}", e);
                ApiErrorCode::UpstreamUnavailable
            }
        }
    }
}

impl From<FetchError> for ApiErrorCode {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::DisallowedHost(_) => ApiErrorCode::DisallowedHost,
            FetchError::InvalidUrl(_) => ApiErrorCode::InvalidRequest,
            FetchError::Upstream(e) => {
                warn!("Upstream error: {}", e);
                ApiErrorCode::UpstreamUnavailable
            }
        }
    }
}

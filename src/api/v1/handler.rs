use super::error::*;
use crate::application_port::{FetchCache, SessionError, SessionService};
use crate::domain_model::{FetchRequest, SubjectId};
use crate::domain_port::{CallbackParams, CookieJar};
use crate::infra_http::RequestCookies;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::{Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

fn with_cookies(reply: impl Reply, cookies: &RequestCookies) -> warp::reply::Response {
    let mut response = reply.into_response();
    for value in cookies.set_cookie_headers() {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!("dropping unencodable cookie: {}", e),
        }
    }
    response
}

fn redirect_to(url: &str) -> Result<warp::reply::Response, ApiErrorCode> {
    let uri: warp::http::Uri = url.parse().map_err(ApiErrorCode::internal)?;
    Ok(warp::redirect::found(uri).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub handle: String,
}

pub async fn login(
    query: LoginQuery,
    cookies: Arc<RequestCookies>,
    session_service: Arc<dyn SessionService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let handle = query.handle.trim().trim_start_matches('@');
    if handle.is_empty() {
        return Ok(error_reply(ApiErrorCode::InvalidRequest));
    }
    let reply = match session_service.begin_login(cookies.clone(), handle).await {
        Ok(url) => redirect_to(url.as_str()).unwrap_or_else(error_reply),
        Err(e) => error_reply(e.into()),
    };
    Ok(with_cookies(reply, &cookies))
}

pub async fn callback(
    params: CallbackParams,
    cookies: Arc<RequestCookies>,
    session_service: Arc<dyn SessionService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let reply = match session_service.complete_login(cookies.clone(), params).await {
        Ok(_) => redirect_to("/").unwrap_or_else(error_reply),
        Err(e) => error_reply(e.into()),
    };
    Ok(with_cookies(reply, &cookies))
}

pub async fn cancel_login(
    cookies: Arc<RequestCookies>,
    session_service: Arc<dyn SessionService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let reply = match session_service.cancel_login(cookies.clone()).await {
        Ok(()) => warp::reply::json(&ApiResponse::ok(())).into_response(),
        Err(e) => error_reply(e.into()),
    };
    Ok(with_cookies(reply, &cookies))
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub subject: SubjectId,
    pub expires_at: DateTime<Utc>,
}

/// Anonymous is a normal answer: `data` is `null`. Only a misconfigured
/// server turns this into an error; storage or provider trouble reads as
/// "logged out".
pub async fn current_session(
    cookies: Arc<RequestCookies>,
    session_service: Arc<dyn SessionService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let jar: Arc<dyn CookieJar> = cookies.clone();
    let reply = match session_service.current_session(jar).await {
        Ok(session) => {
            let view = session.map(|s| SessionView {
                subject: s.subject,
                expires_at: s.expires_at,
            });
            warp::reply::json(&ApiResponse::ok(view)).into_response()
        }
        Err(e @ SessionError::Config(_)) => error_reply(e.into()),
        Err(e) => {
            warn!(error = %e, "session unavailable, serving anonymous");
            warp::reply::json(&ApiResponse::ok(None::<SessionView>)).into_response()
        }
    };
    Ok(with_cookies(reply, &cookies))
}

pub async fn logout(
    cookies: Arc<RequestCookies>,
    session_service: Arc<dyn SessionService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let reply = match session_service.logout(cookies.clone()).await {
        Ok(()) => warp::reply::json(&ApiResponse::ok(())).into_response(),
        Err(e) => error_reply(e.into()),
    };
    Ok(with_cookies(reply, &cookies))
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub url: String,
    pub ttl_secs: Option<u64>,
}

pub async fn metadata(
    query: MetadataQuery,
    fetch_cache: Arc<dyn FetchCache>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let url = Url::parse(&query.url)
        .map_err(|_| ApiErrorCode::InvalidRequest)
        .map_err(reject::custom)?;
    let response = fetch_cache
        .cached_fetch(FetchRequest::get(url), query.ttl_secs.map(Duration::from_secs))
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

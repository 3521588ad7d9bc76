use super::handler;
use crate::application_impl::{SESSION_COOKIE, STATE_COOKIE};
use crate::infra_http::RequestCookies;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::get()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::query::<handler::LoginQuery>())
        .and(request_cookies())
        .and(with(server.session_service.clone()))
        .and_then(handler::login);

    let cancel_login = warp::post()
        .and(warp::path!("login" / "cancel"))
        .and(request_cookies())
        .and(with(server.session_service.clone()))
        .and_then(handler::cancel_login);

    let callback = warp::get()
        .and(warp::path!("oauth" / "callback"))
        .and(warp::query::<crate::domain_port::CallbackParams>())
        .and(request_cookies())
        .and(with(server.session_service.clone()))
        .and_then(handler::callback);

    let session = warp::get()
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(request_cookies())
        .and(with(server.session_service.clone()))
        .and_then(handler::current_session);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(request_cookies())
        .and(with(server.session_service.clone()))
        .and_then(handler::logout);

    let metadata = warp::get()
        .and(warp::path("metadata"))
        .and(warp::path::end())
        .and(warp::query::<handler::MetadataQuery>())
        .and(with(server.fetch_cache.clone()))
        .and_then(handler::metadata);

    login
        .or(cancel_login)
        .or(callback)
        .or(session)
        .or(logout)
        .or(metadata)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn request_cookies() -> impl Filter<Extract = (Arc<RequestCookies>,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(STATE_COOKIE)
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .map(|state: Option<String>, session: Option<String>| {
            Arc::new(RequestCookies::new([
                (STATE_COOKIE, state),
                (SESSION_COOKIE, session),
            ]))
        })
}

use crate::domain_model::SetCookie;
use crate::domain_port::CookieJar;
use std::collections::HashMap;
use std::sync::Mutex;

/// Cookies of one inbound request plus whatever the handlers set on it.
#[derive(Debug, Default)]
pub struct RequestCookies {
    inner: Mutex<Jar>,
}

#[derive(Debug, Default)]
struct Jar {
    incoming: HashMap<String, String>,
    outgoing: Vec<SetCookie>,
}

impl RequestCookies {
    pub fn new<N: Into<String>>(incoming: impl IntoIterator<Item = (N, Option<String>)>) -> Self {
        let incoming = incoming
            .into_iter()
            .filter_map(|(name, value)| Some((name.into(), value?)))
            .collect();
        Self {
            inner: Mutex::new(Jar {
                incoming,
                outgoing: Vec::new(),
            }),
        }
    }

    pub fn set_cookie_headers(&self) -> Vec<String> {
        let jar = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        jar.outgoing.iter().map(|c| c.to_string()).collect()
    }
}

impl CookieJar for RequestCookies {
    fn get(&self, name: &str) -> Option<String> {
        let jar = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match jar.outgoing.iter().find(|c| c.name == name) {
            Some(cookie) if cookie.is_removal() => None,
            Some(cookie) => Some(cookie.value.clone()),
            None => jar.incoming.get(name).cloned(),
        }
    }

    fn set(&self, cookie: SetCookie) {
        let mut jar = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        jar.outgoing.retain(|c| c.name != cookie.name);
        jar.outgoing.push(cookie);
    }
}

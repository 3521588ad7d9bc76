use crate::domain_model::SetCookie;

/// `get` reflects cookies set earlier in the same exchange, so a value
/// written by `set` is readable before the response is sent.
pub trait CookieJar: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, cookie: SetCookie);
}

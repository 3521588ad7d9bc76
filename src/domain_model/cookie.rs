use std::fmt;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age_secs: Option<i64>,
}

impl SetCookie {
    pub fn session_scoped(name: &str, value: String, secure: bool) -> Self {
        SetCookie {
            name: name.to_owned(),
            value,
            path: "/".to_owned(),
            http_only: true,
            secure,
            same_site: SameSite::Lax,
            max_age_secs: None,
        }
    }

    pub fn expired(name: &str, secure: bool) -> Self {
        SetCookie {
            max_age_secs: Some(0),
            ..SetCookie::session_scoped(name, String::new(), secure)
        }
    }

    pub fn with_max_age(mut self, secs: i64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    pub fn is_removal(&self) -> bool {
        self.max_age_secs.is_some_and(|age| age <= 0)
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if let Some(age) = self.max_age_secs {
            write!(f, "; Max-Age={}", age)?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        write!(f, "; SameSite={}", self.same_site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_session_cookie_attributes() {
        let cookie = SetCookie::session_scoped("oauth:atproto:session", "abc.def".into(), true);
        assert_eq!(
            cookie.to_string(),
            "oauth:atproto:session=abc.def; Path=/; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn local_removal_cookie_is_not_secure() {
        let cookie = SetCookie::expired("oauth:atproto:state", false);
        assert!(cookie.is_removal());
        assert_eq!(
            cookie.to_string(),
            "oauth:atproto:state=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"
        );
    }
}

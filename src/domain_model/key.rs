use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque lookup key carried by a cookie. Never contains payload data.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieKey(pub String);

impl CookieKey {
    pub fn generate() -> Self {
        CookieKey(nanoid::nanoid!(32))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CookieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct LockKey(pub String);

impl LockKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&SubjectId> for LockKey {
    fn from(subject: &SubjectId) -> Self {
        LockKey(subject.0.clone())
    }
}

impl From<&str> for LockKey {
    fn from(key: &str) -> Self {
        LockKey(key.to_owned())
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct OwnerToken(pub uuid::Uuid);

impl OwnerToken {
    pub fn new() -> Self {
        OwnerToken(uuid::Uuid::new_v4())
    }
}

impl Default for OwnerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Refresh this long before the access token actually expires.
pub const REFRESH_LEEWAY: Duration = Duration::seconds(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenSet {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + REFRESH_LEEWAY >= self.expires_at
    }
}

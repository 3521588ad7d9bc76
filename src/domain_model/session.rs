use super::{SubjectId, TokenSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One in-flight authorization attempt. The payload belongs to the OAuth client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStateRecord {
    pub handle: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub subject: SubjectId,
    pub tokens: TokenSet,
    /// Protocol-specific key material (e.g. a DPoP key), opaque to this crate.
    #[serde(default)]
    pub key_material: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSession {
    pub subject: SubjectId,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub storage: Storage,
    #[serde(default)]
    pub lock: Lock,
    pub session: Session,
    pub oauth: OAuth,
    pub fetch_cache: FetchCache,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory" or "distributed"
    pub redis: Option<Redis>,
}

#[derive(Debug, Deserialize)]
pub struct Redis {
    pub dsn: String,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Lock {
    pub ttl_secs: u64,
    pub retry_backoff_ms: u64,
    pub retries: u32,
}

impl Default for Lock {
    fn default() -> Self {
        Lock {
            ttl_secs: 30,
            retry_backoff_ms: 100,
            retries: 1,
        }
    }
}

#[derive(Deserialize)]
pub struct Session {
    /// Missing secret is reported per request, not at startup.
    pub secret: Option<String>,
    #[serde(default)]
    pub local_dev: bool,
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,
    pub session_ttl_secs: Option<u64>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("local_dev", &self.local_dev)
            .field("state_ttl_secs", &self.state_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .finish()
    }
}

fn default_state_ttl_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize)]
pub struct OAuth {
    pub backend: String, // "fake"
    pub redirect_uri: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: i64,
}

fn default_access_ttl_secs() -> i64 {
    15 * 60
}

#[derive(Debug, Deserialize)]
pub struct FetchCache {
    #[serde(default = "default_cache_version")]
    pub version: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
    pub allowed_hosts: Vec<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_cache_version() -> String {
    "v1".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// File settings overridden by `SESSIONKEEP__SECTION__KEY` environment variables.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("SESSIONKEEP").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_file_with_defaults() {
        let dir = std::env::temp_dir().join(format!("sessionkeep-{}", nanoid::nanoid!(8)));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("minimal.toml");
        std::fs::write(
            &path,
            r#"
[http]
address = "127.0.0.1:3000"

[log]
filter = "info"

[storage]
backend = "memory"

[session]
secret = "s3cret"
local_dev = true

[oauth]
backend = "fake"
redirect_uri = "http://127.0.0.1:3000/api/v1/oauth/callback"

[fetch_cache]
allowed_hosts = ["registry.npmjs.org"]
"#,
        )
        .unwrap();

        let settings = parse_settings(path.to_str()).unwrap();
        assert_eq!(settings.lock.ttl_secs, 30);
        assert_eq!(settings.lock.retry_backoff_ms, 100);
        assert_eq!(settings.session.state_ttl_secs, 600);
        assert_eq!(settings.fetch_cache.version, "v1");
        assert_eq!(settings.fetch_cache.default_ttl_secs, 300);
        assert!(!format!("{:?}", settings.session).contains("s3cret"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("does/not/exist.toml")).is_err());
    }
}

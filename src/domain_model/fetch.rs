use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Upstream response headers worth keeping next to a cached body.
pub const CACHED_HEADERS: [&str; 4] = ["content-type", "etag", "last-modified", "cache-control"];

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: String,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        FetchRequest {
            method: "GET".to_owned(),
            url,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn post_json(url: Url, body: &serde_json::Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_owned(), "application/json".to_owned());
        FetchRequest {
            method: "POST".to_owned(),
            url,
            headers,
            body: Some(body.to_string().into_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedFetchEntry {
    pub data: serde_json::Value,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Unix milliseconds.
    pub cached_at: i64,
    pub ttl_secs: u64,
}

impl CachedFetchEntry {
    pub fn from_upstream(response: UpstreamResponse, cached_at: i64, ttl_secs: u64) -> Self {
        let headers = response
            .headers
            .into_iter()
            .filter(|(name, _)| CACHED_HEADERS.contains(&name.as_str()))
            .collect();
        // Metadata providers answer with JSON; anything else is kept as text.
        let data = serde_json::from_slice(&response.body).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&response.body).into_owned())
        });
        CachedFetchEntry {
            data,
            status: response.status,
            headers,
            cached_at,
            ttl_secs,
        }
    }

    pub fn is_stale_at(&self, now_ms: i64) -> bool {
        let ttl_ms = i64::try_from(self.ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        now_ms > self.cached_at.saturating_add(ttl_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedResponse {
    pub data: serde_json::Value,
    pub status: u16,
    pub is_stale: bool,
    pub cached_at: i64,
}

impl CachedResponse {
    pub fn from_entry(entry: CachedFetchEntry, is_stale: bool) -> Self {
        CachedResponse {
            data: entry.data,
            status: entry.status,
            is_stale,
            cached_at: entry.cached_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cached_at: i64, ttl_secs: u64) -> CachedFetchEntry {
        CachedFetchEntry {
            data: serde_json::Value::Null,
            status: 200,
            headers: BTreeMap::new(),
            cached_at,
            ttl_secs,
        }
    }

    #[test]
    fn staleness_boundary_is_exclusive() {
        let e = entry(1_000, 5);
        assert!(!e.is_stale_at(1_000));
        assert!(!e.is_stale_at(6_000));
        assert!(e.is_stale_at(6_001));
    }

    #[test]
    fn staleness_matches_formula_over_a_range() {
        for ttl in [0u64, 1, 5, 300] {
            let e = entry(50_000, ttl);
            for now in (40_000..400_000).step_by(777) {
                assert_eq!(e.is_stale_at(now), now > 50_000 + ttl as i64 * 1000);
            }
        }
    }

    #[test]
    fn keeps_only_cacheable_headers_and_falls_back_to_text() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_owned(), "text/plain".to_owned());
        headers.insert("set-cookie".to_owned(), "x=y".to_owned());
        let e = CachedFetchEntry::from_upstream(
            UpstreamResponse {
                status: 200,
                headers,
                body: b"not json".to_vec(),
            },
            0,
            60,
        );
        assert_eq!(e.data, serde_json::Value::String("not json".into()));
        assert_eq!(e.headers.len(), 1);
        assert!(e.headers.contains_key("content-type"));
    }
}

//! Request, payload and configuration types.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::keys;

/// Logical identity of an outbound call, plus the headers needed to make it.
///
/// Only `method`, `url` and (for POST) a digest of `body` take part in the
/// cache key; headers never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    /// A GET request for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST request for `url` carrying `body`.
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Canonical raw cache key for this request.
    pub fn raw_key(&self) -> String {
        keys::build_raw_key(self.method.as_str(), &self.url, self.body.as_deref())
    }
}

/// A cached value, stored exactly as the fetch collaborator produced it.
///
/// Serialized untagged: text is a JSON string, structured data is the JSON
/// value itself. A structured payload that is a bare string therefore reloads
/// as `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    /// Borrow the text body, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Json(_) => None,
        }
    }

    /// Borrow the structured body, if this is a structured payload.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    /// Decode into a typed value.
    ///
    /// Text payloads are parsed as JSON first; text that is not JSON is
    /// offered to `T` as a JSON string.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Payload::Json(value) => T::deserialize(value),
            Payload::Text(text) => serde_json::from_str(text).or_else(|parse_err| {
                T::deserialize(serde_json::Value::String(text.clone())).map_err(|_| parse_err)
            }),
        }
    }

    /// The structured form of this payload. Text becomes a JSON string,
    /// which is exactly what the untagged encoding of a string value reads
    /// back as.
    pub fn into_json(self) -> Self {
        match self {
            Payload::Text(text) => Payload::Json(serde_json::Value::String(text)),
            json @ Payload::Json(_) => json,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Decides whether a cached entry may be served.
///
/// Only `force_refresh` exists: entries never expire on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheValidator {
    /// Skip the cache lookup, fetch, and overwrite the stored value.
    pub force_refresh: bool,
}

/// Per-call options for a cached fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Decode the body as JSON before caching.
    pub json: bool,

    pub validator: CacheValidator,
}

impl FetchOptions {
    /// Cache the body as text.
    pub fn text() -> Self {
        Self::default()
    }

    /// Decode and cache the body as JSON.
    pub fn json() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }

    /// Bypass the cache for this call.
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.validator.force_refresh = force;
        self
    }
}

/// Raw outcome from the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one `<hash>.cache` file per entry.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `FANPULL_CACHE_DIR` | Cache directory (default: `./cache`) |
    pub fn from_env() -> Self {
        Self {
            cache_dir: std::env::var("FANPULL_CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_dir),
        }
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Headers added to every request.
    #[serde(default)]
    pub default_headers: Vec<(String, String)>,
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("fanpull/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            default_headers: Vec::new(),
        }
    }
}

impl HttpConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `FANPULL_HTTP_TIMEOUT` | Request timeout in seconds (default: 30) |
    /// | `FANPULL_USER_AGENT` | User-Agent header |
    pub fn from_env() -> Self {
        Self {
            timeout_secs: std::env::var("FANPULL_HTTP_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            user_agent: std::env::var("FANPULL_USER_AGENT")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_user_agent),
            default_headers: Vec::new(),
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }
}

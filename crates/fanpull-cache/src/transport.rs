//! Fetch collaborator: performs the actual network I/O.
//!
//! The cache never interprets bodies or headers here; it only needs the status
//! (for success classification) and the body text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::types::{FetchRequest, HttpConfig, RawResponse};

/// Performs one outbound request.
///
/// Implementations report non-2xx answers as a `RawResponse`, not an error;
/// `Err` is reserved for transport failures.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> CacheResult<RawResponse>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport from config.
    pub fn new(config: &HttpConfig) -> CacheResult<Self> {
        let mut default_headers = HeaderMap::new();
        let user_agent =
            HeaderValue::from_str(&config.user_agent).map_err(|e| CacheError::Config {
                message: format!("invalid user agent: {}", e),
            })?;
        default_headers.insert(USER_AGENT, user_agent);

        for (name, value) in &config.default_headers {
            let (name, value) = parse_header(name, value)?;
            default_headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| CacheError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    /// Create a transport from environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::new(&HttpConfig::from_env())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &FetchRequest) -> CacheResult<RawResponse> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            let (name, value) = parse_header(name, value)?;
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| CacheError::Network {
            message: format!("failed to read response body from {}: {}", request.url, e),
        })?;

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

fn parse_header(name: &str, value: &str) -> CacheResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| CacheError::Config {
        message: format!("invalid header name {:?}: {}", name, e),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| CacheError::Config {
        message: format!("invalid value for header {}: {}", name, e),
    })?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let (name, value) = parse_header("Referer", "https://bandcamp.com/").unwrap();
        assert_eq!(name.as_str(), "referer");
        assert_eq!(value.to_str().unwrap(), "https://bandcamp.com/");

        assert!(matches!(
            parse_header("bad header", "x"),
            Err(CacheError::Config { .. })
        ));
        assert!(matches!(
            parse_header("X-Ok", "line\nbreak"),
            Err(CacheError::Config { .. })
        ));
    }

    #[test]
    fn test_transport_rejects_invalid_default_header() {
        let config = HttpConfig::default().with_default_header("bad header", "x");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(CacheError::Config { .. })
        ));
    }
}

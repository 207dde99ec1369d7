//! Request-level cached fetch.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::{CacheError, CacheResult};
use crate::pipeline::Pipeline;
use crate::transport::{HttpTransport, Transport};
use crate::types::{FetchOptions, FetchRequest, HttpConfig, Payload};

/// Per-item cache status for a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSurvey {
    pub cached: Vec<bool>,
}

impl CacheSurvey {
    pub fn hits(&self) -> usize {
        self.cached.iter().filter(|hit| **hit).count()
    }

    pub fn misses(&self) -> usize {
        self.cached.len() - self.hits()
    }

    /// `+` for each hit and `-` for each miss.
    pub fn marks(&self) -> String {
        self.cached
            .iter()
            .map(|hit| if *hit { '+' } else { '-' })
            .collect()
    }
}

/// Memoizes fetches in a [`CacheStore`].
///
/// A request whose key is cached never reaches the transport unless the call
/// forces a refresh. Failed and undecodable responses are never cached.
#[derive(Clone)]
pub struct CachedFetcher {
    store: Arc<CacheStore>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for CachedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFetcher")
            .field("cache_dir", &self.store.cache_dir())
            .finish_non_exhaustive()
    }
}

impl CachedFetcher {
    pub fn new(store: Arc<CacheStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    /// Fetcher over the `reqwest` transport.
    pub fn http(store: Arc<CacheStore>, config: &HttpConfig) -> CacheResult<Self> {
        Ok(Self::new(store, Arc::new(HttpTransport::new(config)?)))
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Whether `request` would be served from the cache.
    pub async fn is_cached(&self, request: &FetchRequest) -> bool {
        self.store.exists(&request.raw_key()).await
    }

    /// Fetch `request`, serving it from the cache when possible.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        options: FetchOptions,
    ) -> CacheResult<Payload> {
        let raw_key = request.raw_key();

        if options.validator.force_refresh {
            warn!(url = %request.url, "cache busting");
        } else if self.store.exists(&raw_key).await {
            // A file that vanished or was corrupt since the check falls
            // through to a fresh fetch.
            if let Some(payload) = self.store.get(&raw_key).await? {
                debug!(url = %request.url, "cache hit");
                return Ok(as_requested(payload, options));
            }
        }

        debug!(url = %request.url, "cache miss, fetching");
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(CacheError::FetchFailed {
                url: request.url.clone(),
                status: response.status,
                reason: response.reason,
            });
        }

        let payload = if options.json {
            let value: serde_json::Value =
                serde_json::from_str(&response.body).map_err(|e| CacheError::Decode {
                    url: request.url.clone(),
                    message: e.to_string(),
                })?;
            Payload::Json(value)
        } else {
            Payload::Text(response.body)
        };

        self.store.set(&raw_key, payload.clone()).await?;
        Ok(payload)
    }

    /// Fetch `request` as text.
    pub async fn fetch_text(&self, request: &FetchRequest, force_refresh: bool) -> CacheResult<String> {
        let payload = self
            .fetch(request, FetchOptions::text().force_refresh(force_refresh))
            .await?;
        match payload {
            Payload::Text(text) => Ok(text),
            // Cached by an earlier structured fetch of the same identity.
            Payload::Json(value) => Ok(value.to_string()),
        }
    }

    /// Fetch `request` as JSON and decode it into `T`.
    pub async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        request: &FetchRequest,
        force_refresh: bool,
    ) -> CacheResult<T> {
        let payload = self
            .fetch(request, FetchOptions::json().force_refresh(force_refresh))
            .await?;
        payload.decode().map_err(|e| CacheError::Decode {
            url: request.url.clone(),
            message: e.to_string(),
        })
    }

    /// Report, per request, whether it is already cached.
    pub async fn survey(&self, requests: &[FetchRequest]) -> CacheSurvey {
        let mut cached = Vec::with_capacity(requests.len());
        for request in requests {
            cached.push(self.is_cached(request).await);
        }
        let survey = CacheSurvey { cached };
        info!(
            hits = survey.hits(),
            total = requests.len(),
            "located {} of {} in the cache",
            survey.hits(),
            requests.len()
        );
        survey
    }

    /// Fetch every request one at a time, in order, stopping at the first
    /// failure.
    pub async fn fetch_all(
        &self,
        requests: Vec<FetchRequest>,
        options: FetchOptions,
    ) -> CacheResult<Vec<Payload>> {
        self.fetch_all_with(&Pipeline::sequential(), requests, options)
            .await
    }

    /// Like [`fetch_all`](Self::fetch_all) with a caller-supplied pipeline.
    pub async fn fetch_all_with(
        &self,
        pipeline: &Pipeline,
        requests: Vec<FetchRequest>,
        options: FetchOptions,
    ) -> CacheResult<Vec<Payload>> {
        pipeline
            .run(requests, |request| async move {
                self.fetch(&request, options).await
            })
            .await
    }
}

/// Give a structured caller a structured hit.
///
/// `Text` reaches a JSON fetch when the identity was first cached as text, or
/// when an older file holds a bare JSON string. A body that parses is
/// returned parsed; anything else is that string value.
fn as_requested(payload: Payload, options: FetchOptions) -> Payload {
    match payload {
        Payload::Text(body) if options.json => Payload::Json(
            serde_json::from_str(&body).unwrap_or_else(|_| serde_json::Value::String(body)),
        ),
        other => other,
    }
}

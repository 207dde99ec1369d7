//! Content-addressed fetch cache and sequential fetch pipeline.
//!
//! This crate memoizes expensive, rate-limited network calls and serializes
//! them per unit of work:
//!
//! - Key derivation: canonical raw key per request, SHA-256 hash key
//! - Two-tier store: in-memory map over one JSON file per entry
//! - Startup load with quarantine of corrupt entries
//! - Cached fetch with opt-out refresh per call
//! - Sequential (or bounded) pipeline runner, in order and fail-fast
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fanpull_cache::{CacheConfig, CacheStore, CachedFetcher, FetchOptions, FetchRequest, HttpConfig};
//!
//! # async fn example() -> fanpull_cache::CacheResult<()> {
//! let (store, report) = CacheStore::open(&CacheConfig::from_env()).await?;
//! println!("{} entries loaded, {} corrupt removed", report.loaded, report.removed);
//!
//! let fetcher = CachedFetcher::http(Arc::new(store), &HttpConfig::from_env())?;
//! let page = fetcher
//!     .fetch(&FetchRequest::get("https://bandcamp.com/someone"), FetchOptions::text())
//!     .await?;
//! # let _ = page;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `FANPULL_CACHE_DIR` | Cache directory (default: `./cache`) |
//! | `FANPULL_HTTP_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `FANPULL_USER_AGENT` | User-Agent header |

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod keys;
pub mod pipeline;
pub mod transport;
pub mod types;

// Re-export main types
pub use cache::{CacheStore, LoadReport};
pub use error::{CacheError, CacheResult};
pub use fetcher::{CacheSurvey, CachedFetcher};
pub use keys::{build_hash_key, build_raw_key, HASH_KEY_LEN};
pub use pipeline::{run_bounded, run_sequential, Pipeline, ProgressEvent, ProgressSink};
pub use transport::{HttpTransport, Transport};
pub use types::{
    CacheConfig, CacheValidator, FetchOptions, FetchRequest, HttpConfig, Payload, RawResponse,
};

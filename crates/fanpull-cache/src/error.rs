//! Error types for the fetch cache.

use std::path::{Path, PathBuf};

/// Fetch cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A persisted entry could not be decoded.
    ///
    /// Recovered inside the store (file removed, entry skipped); callers only
    /// see it through logs and load reports.
    #[error("cache entry corrupt: {}: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    /// Storage read/write failure.
    #[error("cache I/O error: {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    /// The remote answered with a non-success status.
    #[error("error fetching {url}: {status} {reason}")]
    FetchFailed {
        url: String,
        status: u16,
        reason: String,
    },

    /// A fetched body could not be decoded as structured data.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Transport failure before any status was received.
    #[error("network error: {message}")]
    Network { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl CacheError {
    pub(crate) fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn corrupt(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,

            // Remote side
            Self::FetchFailed { .. } => 3,
            Self::Network { .. } => 3,
            Self::Decode { .. } => 4,

            // Local storage
            Self::Io { .. } => 5,
            Self::Corrupt { .. } => 5,
        }
    }

    /// Whether the error came from the fetch collaborator rather than the store.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed { .. } | Self::Network { .. } | Self::Decode { .. }
        )
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failed_message_names_url_and_status() {
        let err = CacheError::FetchFailed {
            url: "https://bandcamp.com/someone".to_string(),
            status: 503,
            reason: "Service Unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "error fetching https://bandcamp.com/someone: 503 Service Unavailable"
        );
        assert!(err.is_fetch_error());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = CacheError::io(Path::new("/tmp/cache/abc.cache"), "permission denied");
        assert_eq!(
            err.to_string(),
            "cache I/O error: /tmp/cache/abc.cache: permission denied"
        );
        assert!(!err.is_fetch_error());
    }
}

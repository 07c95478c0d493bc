//! Retrieval of yearly report archives.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

use crate::catalog::ReportFamily;

/// Why a yearly archive could not be retrieved.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The archive does not exist (yet) at the source.
    #[error("{archive} is not published")]
    NotPublished { archive: String },
    /// The source could not be reached or returned unusable content.
    #[error(transparent)]
    Unreachable(cftc_archive::Error),
}

impl FetchError {
    /// True when a later attempt may succeed (network failure, 429, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::NotPublished { .. } => false,
            FetchError::Unreachable(err) => err.is_transient(),
        }
    }
}

impl From<cftc_archive::Error> for FetchError {
    fn from(err: cftc_archive::Error) -> Self {
        match err {
            cftc_archive::Error::NotFound { url } => FetchError::NotPublished { archive: url },
            other => FetchError::Unreachable(other),
        }
    }
}

/// Source of raw report text, one calendar year at a time.
///
/// Implementations return the decompressed comma-separated text for the
/// family's archive of `year`. The HTTP implementation is
/// [`HttpArchiveFetcher`]; tests and mirrors plug in their own.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, family: &ReportFamily, year: i32) -> Result<Vec<u8>, FetchError>;
}

struct RetryConfig {
    max_retries: usize,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryConfig {
    fn from_env() -> Self {
        Self {
            max_retries: env_usize("COT_RETRY_MAX", 3),
            base_delay_ms: env_u64("COT_RETRY_BASE_MS", 1000),
            max_delay_ms: env_u64("COT_RETRY_MAX_MS", 15000),
        }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(30) as u32;
        let exp = 1u64 << shift;
        let base = self
            .base_delay_ms
            .saturating_mul(exp)
            .min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((base as f64 * jitter) as u64)
    }
}

/// Downloads archives from the CFTC history area (or a mirror of it).
pub struct HttpArchiveFetcher {
    inner: cftc_archive::Client,
    retry: RetryConfig,
}

impl HttpArchiveFetcher {
    /// Creates a fetcher for `COT_BASE_URL` when set, otherwise for the
    /// production CFTC location.
    pub fn new() -> Result<Self, FetchError> {
        let base_url = std::env::var("COT_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| cftc_archive::DEFAULT_BASE_URL.to_string());
        Self::with_base_url(&base_url)
    }

    /// Creates a fetcher with a custom base URL. Used for testing.
    pub fn with_base_url(base_url: &str) -> Result<Self, FetchError> {
        let inner = cftc_archive::Client::with_base_url(base_url)?;
        Ok(Self {
            inner,
            retry: RetryConfig::from_env(),
        })
    }

    /// Overrides the retry budget read from `COT_RETRY_MAX`.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    async fn with_retry(&self, archive: &str, entry: &str) -> Result<Vec<u8>, cftc_archive::Error> {
        let mut attempt = 0usize;
        loop {
            match self.inner.fetch_text_file(archive, entry).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.retry.max_retries || !err.is_transient() {
                        return Err(err);
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{} download failed (attempt {}/{}), retrying in {:.1}s",
                        archive,
                        attempt,
                        self.retry.max_retries,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch(&self, family: &ReportFamily, year: i32) -> Result<Vec<u8>, FetchError> {
        let archive = family.archive_name(year);
        let entry = family.text_file_name(year);
        self.with_retry(&archive, &entry).await.map_err(|e| match e {
            cftc_archive::Error::NotFound { .. } => FetchError::NotPublished { archive },
            other => FetchError::from(other),
        })
    }
}

pub(crate) fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let cfg = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 350,
        };
        let first = cfg.delay_for_attempt(1).as_millis();
        assert!((80..=120).contains(&first));
        let third = cfg.delay_for_attempt(3).as_millis();
        assert!((280..=420).contains(&third));
        let tenth = cfg.delay_for_attempt(10).as_millis();
        assert!(tenth <= 420);
    }

    #[test]
    fn test_env_defaults_when_unset() {
        assert_eq!(env_usize("COT_TEST_SURELY_UNSET_VAR", 7), 7);
        assert_eq!(env_u64("COT_TEST_SURELY_UNSET_VAR", 9), 9);
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::NotPublished {
            archive: "deacot2031.zip".to_string(),
        };
        assert_eq!(err.to_string(), "deacot2031.zip is not published");
    }

    #[test]
    fn test_unreachable_keeps_status_and_transience() {
        let err = FetchError::from(cftc_archive::Error::HttpStatus {
            status: 503,
            body: "Service Unavailable".to_string(),
        });
        match &err {
            FetchError::Unreachable(cftc_archive::Error::HttpStatus { status, .. }) => {
                assert_eq!(*status, 503)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_transient());
        assert!(!FetchError::from(cftc_archive::Error::Archive("bad".to_string())).is_transient());
    }

    #[test]
    fn test_not_found_converts_to_not_published() {
        let err = FetchError::from(cftc_archive::Error::NotFound {
            url: "https://example.test/deacot2031.zip".to_string(),
        });
        assert!(matches!(err, FetchError::NotPublished { .. }));
        assert!(!err.is_transient());
    }
}

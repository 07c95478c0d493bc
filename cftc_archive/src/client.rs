//! HTTP client for the CFTC history file area.

use std::time::Duration;

use url::Url;

use crate::{extract, Error};

/// Production location of the yearly compressed report files.
pub const DEFAULT_BASE_URL: &str = "https://www.cftc.gov/files/dea/history";

/// Whole-archive downloads for the older families run to tens of megabytes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const USER_AGENT: &str = concat!("cot-reports/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the CFTC history archives.
///
/// Holds one pooled `reqwest::Client`; archive names are resolved relative to
/// the base URL.
pub struct Client {
    http: reqwest::Client,
    /// Base URL for archive files. Defaults to [`DEFAULT_BASE_URL`].
    base_url: String,
}

impl Client {
    /// Creates a new client pointing at the production CFTC history area.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL. Used for mirrors and for
    /// testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_url(&self, file_name: &str) -> Result<Url, Error> {
        Url::parse(format!("{}/{}", self.base_url, file_name).as_str()).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::RequestFailed
        })
    }

    /// Downloads one archive and returns its raw (still compressed) bytes.
    pub async fn download(&self, file_name: &str) -> Result<Vec<u8>, Error> {
        let url = self.get_url(file_name)?;
        tracing::debug!("Downloading {}", url);

        let resp = self.http.get(url.clone()).send().await.map_err(|e| {
            tracing::error!("Failed to get archive {}: {}", url, e);
            Error::RequestFailed
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            let snippet = truncate_body(&body);
            tracing::error!("Request failed with status {}: {}", status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| {
            tracing::error!("Failed to read archive body: {}", e);
            Error::RequestFailed
        })?;
        Ok(bytes.to_vec())
    }

    /// Downloads `archive` and returns the decompressed contents of its
    /// `entry` text file.
    pub async fn fetch_text_file(&self, archive: &str, entry: &str) -> Result<Vec<u8>, Error> {
        let bytes = self.download(archive).await?;
        extract::extract_entry(&bytes, entry)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}

//! Error types for the archive client.

/// Errors that can occur when downloading or unpacking an archive.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An HTTP request failed (network error, timeout, or unreadable body).
    #[error("Request failed")]
    RequestFailed,
    /// The archive does not exist on the server (HTTP 404).
    #[error("Archive not found: {url}")]
    NotFound { url: String },
    /// The server returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The downloaded bytes are not a readable zip archive.
    #[error("Corrupt archive: {0}")]
    Archive(String),
    /// The zip archive does not contain the expected text entry.
    #[error("Archive has no entry named {name} (entries: {available:?})")]
    MissingEntry { name: String, available: Vec<String> },
}

impl Error {
    /// True when the failure may go away on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RequestFailed => true,
            Error::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Error::NotFound { .. } | Error::Archive(_) | Error::MissingEntry { .. } => false,
        }
    }
}

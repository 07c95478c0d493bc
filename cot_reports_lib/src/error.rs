//! Error types for the library layer.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::fetch::FetchError;

/// Errors produced while building a session or assembling a report.
///
/// Row-level defects are not errors; they are reported through
/// [`crate::parser::ParsedArchive::defects`].
#[derive(Error, Debug)]
pub enum CotError {
    /// The identifier is not in the report catalog.
    #[error("Unknown report family '{id}' (expected one of: {})", .known.join(", "))]
    UnknownReportFamily { id: String, known: Vec<String> },
    /// A yearly archive could not be retrieved.
    #[error("{family} archive for {year} is unavailable: {source}")]
    SourceUnavailable {
        family: String,
        year: i32,
        #[source]
        source: FetchError,
    },
    /// A yearly archive lacks a column every row needs.
    #[error("{family} archive for {year} is missing required column(s): {}", .missing.join(", "))]
    Schema {
        family: String,
        year: i32,
        missing: Vec<String>,
    },
    /// A yearly archive could not be read as delimited text at all.
    #[error("{family} archive for {year} is unreadable: {message}")]
    Parse {
        family: String,
        year: i32,
        message: String,
    },
    /// The HTTP fetcher could not be constructed.
    #[error("Archive client setup failed: {0}")]
    Client(#[source] FetchError),
    /// Caller-supplied input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The embedded report catalog failed validation.
    #[error("Report catalog error: {0}")]
    Catalog(#[from] CatalogError),
    /// A per-year worker task panicked or was cancelled.
    #[error("Archive worker failed: {0}")]
    Task(String),
}

impl CotError {
    /// True for failures caused by a missing or unreachable archive.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, CotError::SourceUnavailable { .. })
    }
}

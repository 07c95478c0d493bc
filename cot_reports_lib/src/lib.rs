//! Library layer for COT reports: report catalog, archive parsing, and a
//! cached per-family query session.
//!
//! Wraps the `cftc_archive` download client with schema-driven parsing,
//! exact-name contract selection across naming eras, a multi-year merge, and
//! a session-owned cache.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod session;
pub mod years;

pub use cftc_archive;

pub use catalog::{Catalog, CatalogError, ReportFamily, ReportSchema};
pub use error::CotError;
pub use fetch::{ArchiveFetcher, FetchError, HttpArchiveFetcher};
pub use filter::{closest_contract_names, AliasSet};
pub use parser::{parse_archive, DefectKind, MalformedRecord, ParsedArchive};
pub use record::{MergedReport, Record, RecordView};
pub use session::{CommitmentsOfTraders, SessionConfig, SessionState};
pub use years::{current_years_for, years_for};

//! The `CommitmentsOfTraders` session facade.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::cache::ReportCache;
use crate::catalog::{Catalog, ReportFamily};
use crate::error::CotError;
use crate::fetch::{env_usize, ArchiveFetcher, HttpArchiveFetcher};
use crate::filter::AliasSet;
use crate::merge::merge;
use crate::pipeline::{collect_years, load_year};
use crate::record::MergedReport;
use crate::years::{self, years_for};

/// Default number of yearly archives fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Runtime tuning for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on concurrently fetched yearly archives. Values below 1
    /// are treated as 1; values above the number of years are clamped to it.
    pub concurrency: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl SessionConfig {
    /// Reads `COT_FETCH_CONCURRENCY`, falling back to the default.
    pub fn from_env() -> Self {
        Self {
            concurrency: env_usize("COT_FETCH_CONCURRENCY", DEFAULT_CONCURRENCY).max(1),
        }
    }
}

/// Whether a session has served any report yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
}

/// A query session bound to one report family.
///
/// The session owns its cache: repeated `report` calls for the same alias
/// set (in any order), or for a subset of an already-loaded set, are served
/// without touching the source. Dropping the session discards the cache.
pub struct CommitmentsOfTraders {
    family: Arc<ReportFamily>,
    fetcher: Arc<dyn ArchiveFetcher>,
    cache: ReportCache,
    config: SessionConfig,
    today: Option<NaiveDate>,
}

impl CommitmentsOfTraders {
    /// Opens a session for `report_family` against the CFTC archives.
    pub fn new(report_family: &str) -> Result<Self, CotError> {
        let fetcher = HttpArchiveFetcher::new().map_err(CotError::Client)?;
        Self::with_fetcher(report_family, Arc::new(fetcher))
    }

    /// Opens a session for `report_family` with a caller-supplied source.
    pub fn with_fetcher(
        report_family: &str,
        fetcher: Arc<dyn ArchiveFetcher>,
    ) -> Result<Self, CotError> {
        let catalog = Catalog::builtin()?;
        Self::from_catalog(&catalog, report_family, fetcher)
    }

    /// Opens a session against an explicit catalog.
    pub fn from_catalog(
        catalog: &Catalog,
        report_family: &str,
        fetcher: Arc<dyn ArchiveFetcher>,
    ) -> Result<Self, CotError> {
        let family = catalog.family(report_family)?;
        Ok(Self {
            family,
            fetcher,
            cache: ReportCache::new(),
            config: SessionConfig::from_env(),
            today: None,
        })
    }

    /// Pins the date the session treats as today. The year range and the
    /// current-year skip rule are evaluated against it.
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn family(&self) -> &ReportFamily {
        &self.family
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn state(&self) -> SessionState {
        if self.cache.is_empty() {
            SessionState::Uninitialized
        } else {
            SessionState::Ready
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(years::today)
    }

    /// Every published row for any of `aliases`, newest first.
    ///
    /// Names match exactly. A set that matches nothing yields an empty
    /// report, not an error.
    pub async fn report<I, S>(&self, aliases: I) -> Result<Arc<MergedReport>, CotError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases = AliasSet::new(aliases)?;
        self.cache
            .get_or_compute(&aliases, || self.build_report(&aliases))
            .await
    }

    async fn build_report(&self, aliases: &AliasSet) -> Result<MergedReport, CotError> {
        let today = self.today();
        let years = years_for(&self.family, today);
        tracing::debug!(
            "{}: loading {} yearly archives for {:?}",
            self.family.id(),
            years.len(),
            aliases.as_slice()
        );

        let per_year = collect_years(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.family),
            &years,
            today.year(),
            self.config.concurrency,
            aliases,
        )
        .await?;

        let report = merge(
            self.family.id(),
            Arc::clone(self.family.schema().columns()),
            per_year,
        );
        tracing::info!(
            "{}: {} rows for {} contract name(s)",
            self.family.id(),
            report.len(),
            aliases.as_slice().len()
        );
        Ok(report)
    }

    /// Distinct contract names in the most recent published year.
    ///
    /// Falls back to the previous year while the current year's archive is
    /// not published yet.
    pub async fn list_available_contracts(&self) -> Result<Arc<BTreeSet<String>>, CotError> {
        self.cache
            .contracts_or_compute(|| self.load_contracts())
            .await
    }

    async fn load_contracts(&self) -> Result<BTreeSet<String>, CotError> {
        let current = self.today().year();
        if current < self.family.first_year() {
            return Ok(BTreeSet::new());
        }

        let parsed = match load_year(self.fetcher.as_ref(), &self.family, current).await {
            Ok(parsed) => parsed,
            Err(err) if err.is_source_unavailable() && current > self.family.first_year() => {
                tracing::info!("{}; listing contracts from {}", err, current - 1);
                load_year(self.fetcher.as_ref(), &self.family, current - 1).await?
            }
            Err(err) => return Err(err),
        };

        Ok(parsed.records.into_iter().map(|r| r.contract).collect())
    }

    /// Drops every cached report and the cached contract list.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(SessionConfig::default().concurrency, 4);
    }

    #[test]
    fn test_unknown_family_lists_known_ids() {
        struct Never;

        #[async_trait::async_trait]
        impl ArchiveFetcher for Never {
            async fn fetch(
                &self,
                _family: &ReportFamily,
                _year: i32,
            ) -> Result<Vec<u8>, crate::fetch::FetchError> {
                unreachable!()
            }
        }

        let err = CommitmentsOfTraders::with_fetcher("bogus", Arc::new(Never))
            .err()
            .unwrap();
        match err {
            CotError::UnknownReportFamily { id, known } => {
                assert_eq!(id, "bogus");
                assert!(known.iter().any(|k| k == "legacy_fut"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

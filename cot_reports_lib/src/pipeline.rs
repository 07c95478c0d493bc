//! Concurrent per-year fetch, parse and filter.
//!
//! Each year runs as its own task on a `JoinSet`, bounded by a `Semaphore`.
//! Tasks own their year-local records and hand them back to the collector,
//! which is the only writer to the merge input.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::catalog::ReportFamily;
use crate::error::CotError;
use crate::fetch::ArchiveFetcher;
use crate::filter::{filter, AliasSet};
use crate::parser::{parse_archive, ParsedArchive};
use crate::record::Record;

/// Fetches and parses a single year's archive.
pub async fn load_year(
    fetcher: &dyn ArchiveFetcher,
    family: &ReportFamily,
    year: i32,
) -> Result<ParsedArchive, CotError> {
    let raw = fetcher
        .fetch(family, year)
        .await
        .map_err(|source| CotError::SourceUnavailable {
            family: family.id().to_string(),
            year,
            source,
        })?;
    parse_archive(family, year, &raw)
}

/// Loads every year in `years` and keeps only rows for `aliases`.
///
/// An unavailable `current_year` archive is skipped; any other failure
/// fails the whole call and cancels the years still in flight. The returned
/// groups are in completion order; [`crate::merge::merge`] imposes the
/// final ordering.
pub async fn collect_years(
    fetcher: Arc<dyn ArchiveFetcher>,
    family: Arc<ReportFamily>,
    years: &[i32],
    current_year: i32,
    concurrency: usize,
    aliases: &AliasSet,
) -> Result<Vec<(i32, Vec<Record>)>, CotError> {
    let semaphore = Arc::new(Semaphore::new(permits(concurrency, years.len())));
    let aliases = Arc::new(aliases.clone());
    let mut join_set = JoinSet::new();

    for &year in years {
        let sem = Arc::clone(&semaphore);
        let fetcher = Arc::clone(&fetcher);
        let family = Arc::clone(&family);
        let aliases = Arc::clone(&aliases);

        join_set.spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| CotError::Task(e.to_string()))?;
            let parsed = load_year(fetcher.as_ref(), &family, year).await?;
            Ok::<_, CotError>((year, filter(parsed.records, &aliases)))
        });
    }

    let mut per_year = Vec::with_capacity(years.len());
    while let Some(joined) = join_set.join_next().await {
        let outcome = joined.map_err(|e| CotError::Task(e.to_string()))?;
        match outcome {
            Ok(group) => per_year.push(group),
            Err(CotError::SourceUnavailable {
                family,
                year,
                source,
            }) if year == current_year => {
                tracing::info!(
                    "{} {} not available yet, skipping: {}",
                    family,
                    year,
                    source
                );
            }
            Err(err) => {
                join_set.abort_all();
                return Err(err);
            }
        }
    }

    Ok(per_year)
}

/// At least one permit and at most one per year, which keeps the count under
/// `Semaphore::MAX_PERMITS`.
fn permits(concurrency: usize, years: usize) -> usize {
    concurrency.clamp(1, years.clamp(1, Semaphore::MAX_PERMITS))
}

//! Multi-year merge into one newest-first table.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::record::{MergedReport, Record};

/// Merges per-year filtered records into a [`MergedReport`].
///
/// Years are visited newest first and, within a year, in parse order; the
/// first row seen for a `(date, contract)` pair is kept. Archives that
/// republish boundary weeks therefore resolve in favor of the most recently
/// published year. The result is stable-sorted by date, descending, so the
/// order in which years were fetched never shows in the output.
pub fn merge(family: &str, columns: Arc<[String]>, mut per_year: Vec<(i32, Vec<Record>)>) -> MergedReport {
    per_year.sort_by(|a, b| b.0.cmp(&a.0));

    let capacity = per_year.iter().map(|(_, rows)| rows.len()).sum();
    let mut seen: HashSet<(NaiveDate, String)> = HashSet::with_capacity(capacity);
    let mut records = Vec::with_capacity(capacity);
    let mut dropped = 0usize;

    for (year, rows) in per_year {
        for record in rows {
            if seen.insert((record.date, record.contract.clone())) {
                records.push(record);
            } else {
                dropped += 1;
                tracing::debug!(
                    "{}: dropping {} row for {} {} already seen in a later archive",
                    family,
                    year,
                    record.contract,
                    record.date
                );
            }
        }
    }

    if dropped > 0 {
        tracing::debug!("{}: {} duplicate rows dropped during merge", family, dropped);
    }

    records.sort_by(|a, b| b.date.cmp(&a.date));
    MergedReport::new(family, columns, records)
}

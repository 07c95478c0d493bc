//! Normalized report rows and the merged, date-ordered table.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// One normalized archive row.
///
/// `values` lines up with the owning schema's column list. Absent source
/// values are `None`, never zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub date: NaiveDate,
    pub contract: String,
    pub values: Vec<Option<f64>>,
}

impl Record {
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// Rows selected for one alias set across every fetched year, newest first.
///
/// No two records share the same `(date, contract)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedReport {
    family: String,
    columns: Arc<[String]>,
    records: Vec<Record>,
}

impl MergedReport {
    pub(crate) fn new(family: &str, columns: Arc<[String]>, records: Vec<Record>) -> Self {
        Self {
            family: family.to_string(),
            columns,
            records,
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Numeric column names, in record value order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn newest_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn oldest_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Contract names that actually occur in the report.
    pub fn contracts(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.contract.as_str()).collect()
    }

    /// `(date, value)` pairs for one column, newest first. `None` if the
    /// column is not part of the schema.
    pub fn series(&self, column: &str) -> Option<Vec<(NaiveDate, Option<f64>)>> {
        let index = self.columns.iter().position(|c| c == column)?;
        Some(
            self.records
                .iter()
                .map(|r| (r.date, r.value(index)))
                .collect(),
        )
    }

    /// Row views pairing each record with the column names.
    pub fn rows(&self) -> impl Iterator<Item = RecordView<'_>> {
        self.records.iter().map(move |record| RecordView {
            columns: &self.columns,
            record,
        })
    }
}

/// A record together with its column names; serializes as a flat map.
pub struct RecordView<'a> {
    columns: &'a [String],
    record: &'a Record,
}

impl<'a> RecordView<'a> {
    pub fn record(&self) -> &'a Record {
        self.record
    }

    pub fn cells(&self) -> impl Iterator<Item = (&'a str, Option<f64>)> + '_ {
        self.columns
            .iter()
            .zip(self.record.values.iter())
            .map(|(name, value)| (name.as_str(), *value))
    }
}

impl Serialize for RecordView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len() + 2))?;
        map.serialize_entry("date", &self.record.date)?;
        map.serialize_entry("contract", &self.record.contract)?;
        for (name, value) in self.cells() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl Serialize for MergedReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for row in self.rows() {
            seq.serialize_element(&row)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MergedReport {
        let columns: Arc<[String]> = vec!["Open Interest".to_string(), "Net".to_string()].into();
        MergedReport::new(
            "legacy_fut",
            columns,
            vec![
                Record {
                    date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
                    contract: "B".to_string(),
                    values: vec![Some(10.0), None],
                },
                Record {
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    contract: "A".to_string(),
                    values: vec![Some(12.5), Some(-3.0)],
                },
            ],
        )
    }

    #[test]
    fn test_series_preserves_nulls() {
        let report = sample();
        let net = report.series("Net").unwrap();
        assert_eq!(net[0].1, None);
        assert_eq!(net[1].1, Some(-3.0));
        assert!(report.series("Nope").is_none());
    }

    #[test]
    fn test_date_bounds_and_contracts() {
        let report = sample();
        assert_eq!(report.newest_date(), NaiveDate::from_ymd_opt(2024, 1, 9));
        assert_eq!(report.oldest_date(), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(report.contracts().into_iter().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_serializes_rows_as_maps_with_null() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json[0]["date"], "2024-01-09");
        assert_eq!(json[0]["contract"], "B");
        assert_eq!(json[0]["Open Interest"], 10.0);
        assert!(json[0]["Net"].is_null());
        assert_eq!(json[1]["Net"], -3.0);
    }
}

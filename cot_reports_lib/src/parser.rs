//! Yearly archive parsing and normalization.
//!
//! Turns one year's comma-separated text into [`Record`]s under the family's
//! fixed schema.
//!
//! - **Header drift**: each schema field maps to the first of its known
//!   source headers present this year; unrecognized headers are ignored.
//! - **Row-level recovery**: a row with an unparsable date or no contract
//!   name is skipped and recorded, never failing the year.
//! - **Nulls stay null**: empty cells and the CFTC `.` placeholder become
//!   `None`; garbage in a numeric cell becomes `None` plus a recorded defect.
//! - Output keeps source row order.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use csv::ByteRecord;

use crate::catalog::{DateSource, ReportFamily};
use crate::error::CotError;
use crate::record::Record;

/// What went wrong with one source row.
#[derive(Debug, Clone, PartialEq)]
pub enum DefectKind {
    /// The row could not be split into fields.
    Unreadable,
    /// No date source on the row parsed with any accepted format. Row skipped.
    UnparsableDate,
    /// The contract-name cell is empty. Row skipped.
    MissingContract,
    /// A numeric cell held non-numeric content. Row kept, value `None`.
    InvalidNumber { column: String },
}

/// A row-level defect found while parsing one archive.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRecord {
    /// 1-based line number in the source text.
    pub line: u64,
    pub kind: DefectKind,
    pub detail: String,
}

impl MalformedRecord {
    /// True when the defect caused the whole row to be dropped.
    pub fn row_skipped(&self) -> bool {
        !matches!(self.kind, DefectKind::InvalidNumber { .. })
    }
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.detail)
    }
}

/// Parse output for one `(family, year)` archive.
#[derive(Debug, Clone)]
pub struct ParsedArchive {
    pub year: i32,
    pub records: Vec<Record>,
    pub defects: Vec<MalformedRecord>,
    pub rows_read: usize,
}

impl ParsedArchive {
    pub fn rows_skipped(&self) -> usize {
        self.defects.iter().filter(|d| d.row_skipped()).count()
    }
}

/// Source column positions resolved from one year's header row.
struct ColumnMap<'a> {
    contract: usize,
    dates: Vec<(usize, &'a DateSource)>,
    fields: Vec<Option<usize>>,
    /// `(long, short)` value positions per derived column.
    derived: Vec<(usize, usize)>,
}

/// Parse one year's raw archive text for `family`.
///
/// Fails only when the header row is unreadable or lacks the contract-name
/// or every date column; everything else is recovered row by row.
pub fn parse_archive(
    family: &ReportFamily,
    year: i32,
    raw: &[u8],
) -> Result<ParsedArchive, CotError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw);

    let headers = reader
        .byte_headers()
        .map_err(|e| CotError::Parse {
            family: family.id().to_string(),
            year,
            message: format!("Failed to read header row: {e}"),
        })?
        .clone();

    let header_map = build_header_map(&headers);
    let columns = resolve_columns(family, year, &header_map)?;
    let names = family.schema().columns();

    let mut records = Vec::new();
    let mut defects = Vec::new();
    let mut rows_read = 0usize;

    for result in reader.byte_records() {
        rows_read += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                record_defect(
                    family,
                    year,
                    &mut defects,
                    MalformedRecord {
                        line,
                        kind: DefectKind::Unreadable,
                        detail: format!("CSV parse error: {e}"),
                    },
                );
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        match parse_row(&row, &columns, names, line) {
            Ok((record, warnings)) => {
                for warning in warnings {
                    record_defect(family, year, &mut defects, warning);
                }
                records.push(record);
            }
            Err(defect) => record_defect(family, year, &mut defects, defect),
        }
    }

    tracing::debug!(
        "{} {}: parsed {} of {} rows ({} defects)",
        family.id(),
        year,
        records.len(),
        rows_read,
        defects.len()
    );

    Ok(ParsedArchive {
        year,
        records,
        defects,
        rows_read,
    })
}

fn record_defect(
    family: &ReportFamily,
    year: i32,
    defects: &mut Vec<MalformedRecord>,
    defect: MalformedRecord,
) {
    tracing::warn!("{} {} {}", family.id(), year, defect);
    defects.push(defect);
}

fn build_header_map(headers: &ByteRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        map.entry(normalize_header_name(&String::from_utf8_lossy(name)))
            .or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // A UTF-8 BOM can prefix the first header of files re-saved by
    // spreadsheet tools.
    name.trim()
        .trim_start_matches('\u{feff}')
        .trim_matches('"')
        .trim()
        .to_lowercase()
}

fn lookup(header_map: &HashMap<String, usize>, candidates: &[String]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| header_map.get(&normalize_header_name(c)).copied())
}

fn resolve_columns<'a>(
    family: &'a ReportFamily,
    year: i32,
    header_map: &HashMap<String, usize>,
) -> Result<ColumnMap<'a>, CotError> {
    let schema = family.schema();
    let mut missing = Vec::new();

    let contract = lookup(header_map, schema.contract_columns());
    if contract.is_none() {
        missing.push(format!(
            "contract name (one of: {})",
            schema.contract_columns().join(", ")
        ));
    }

    let dates: Vec<(usize, &DateSource)> = schema
        .dates()
        .iter()
        .filter_map(|source| {
            header_map
                .get(&normalize_header_name(&source.column))
                .map(|&idx| (idx, source))
        })
        .collect();
    if dates.is_empty() {
        missing.push(format!(
            "report date (one of: {})",
            schema
                .dates()
                .iter()
                .map(|d| d.column.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    let contract = match contract {
        Some(idx) if missing.is_empty() => idx,
        _ => {
            return Err(CotError::Schema {
                family: family.id().to_string(),
                year,
                missing,
            })
        }
    };

    let fields: Vec<Option<usize>> = schema
        .fields()
        .iter()
        .map(|field| {
            let idx = lookup(header_map, &field.columns);
            if idx.is_none() {
                tracing::debug!(
                    "{} {}: no source column for '{}', values will be null",
                    family.id(),
                    year,
                    field.name
                );
            }
            idx
        })
        .collect();

    let derived = schema
        .derived()
        .iter()
        .filter_map(|d| {
            let long = schema.column_index(&d.long)?;
            let short = schema.column_index(&d.short)?;
            Some((long, short))
        })
        .collect();

    Ok(ColumnMap {
        contract,
        dates,
        fields,
        derived,
    })
}

fn cell(row: &ByteRecord, idx: usize) -> String {
    row.get(idx)
        .map(|b| String::from_utf8_lossy(b).trim().to_string())
        .unwrap_or_default()
}

fn parse_row(
    row: &ByteRecord,
    columns: &ColumnMap<'_>,
    names: &[String],
    line: u64,
) -> Result<(Record, Vec<MalformedRecord>), MalformedRecord> {
    let contract = cell(row, columns.contract);
    if contract.is_empty() {
        return Err(MalformedRecord {
            line,
            kind: DefectKind::MissingContract,
            detail: "empty contract name".to_string(),
        });
    }

    let date = parse_date(row, &columns.dates).map_err(|raw| MalformedRecord {
        line,
        kind: DefectKind::UnparsableDate,
        detail: format!("unparsable report date {:?} for {}", raw, contract),
    })?;

    let mut warnings = Vec::new();
    let mut values = Vec::with_capacity(names.len());
    for (field_idx, source) in columns.fields.iter().enumerate() {
        let value = match source {
            None => None,
            Some(idx) => {
                let raw = cell(row, *idx);
                match parse_number(&raw) {
                    Ok(v) => v,
                    Err(()) => {
                        warnings.push(MalformedRecord {
                            line,
                            kind: DefectKind::InvalidNumber {
                                column: names[field_idx].clone(),
                            },
                            detail: format!(
                                "non-numeric value {:?} in '{}' for {}",
                                raw, names[field_idx], contract
                            ),
                        });
                        None
                    }
                }
            }
        };
        values.push(value);
    }

    for (long, short) in &columns.derived {
        let net = match (values[*long], values[*short]) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        };
        values.push(net);
    }

    Ok((
        Record {
            date,
            contract,
            values,
        },
        warnings,
    ))
}

/// First date source that parses wins. On failure returns the raw cells seen.
fn parse_date(row: &ByteRecord, sources: &[(usize, &DateSource)]) -> Result<NaiveDate, Vec<String>> {
    let mut seen = Vec::new();
    for (idx, source) in sources {
        let raw = cell(row, *idx);
        if raw.is_empty() {
            continue;
        }
        for format in &source.formats {
            if let Some(date) = parse_date_with(&raw, format) {
                return Ok(date);
            }
        }
        seen.push(raw);
    }
    Err(seen)
}

fn parse_date_with(raw: &str, format: &str) -> Option<NaiveDate> {
    // YYMMDD columns lose their leading zero when round-tripped through a
    // numeric cell (2006-01-03 -> 60103).
    if format == "%y%m%d" && raw.len() == 5 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(&format!("0{raw}"), format).ok();
    }
    NaiveDate::parse_from_str(raw, format).ok()
}

/// `Ok(None)` for absent values, `Err` for content that is not a number.
fn parse_number(raw: &str) -> Result<Option<f64>, ()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Ok(None);
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    const TINY: &str = r#"
schemas:
  tiny:
    contract_columns: ["Market and Exchange Names", "Market_and_Exchange_Names"]
    dates:
      - column: "As of Date in Form YYYY-MM-DD"
        formats: ["%Y-%m-%d", "%m/%d/%Y"]
      - column: "As of Date in Form YYMMDD"
        formats: ["%y%m%d"]
    fields:
      - name: "Open Interest"
        columns: ["Open Interest (All)", "Open_Interest_All"]
      - name: "Long"
        columns: ["Noncommercial Positions-Long (All)"]
      - name: "Short"
        columns: ["Noncommercial Positions-Short (All)", "NonComm_Positions_Short_All"]
    derived:
      - name: "Net"
        long: "Long"
        short: "Short"
families:
  - id: tiny_fut
    description: "Tiny"
    schema: tiny
    first_year: 2020
    archive: "tiny_{year}.zip"
    text_file: "tiny.txt"
"#;

    fn family() -> std::sync::Arc<ReportFamily> {
        Catalog::from_yaml(TINY).unwrap().get("tiny_fut").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parses_rows_in_source_order() {
        let raw = "\
\"Market and Exchange Names\",\"As of Date in Form YYYY-MM-DD\",\"Open Interest (All)\",\"Noncommercial Positions-Long (All)\",\"Noncommercial Positions-Short (All)\"
\"WHEAT - CHICAGO BOARD OF TRADE\",2024-01-02,1000,300,100
\"CORN - CHICAGO BOARD OF TRADE\",2024-01-09,2000,50,75
";
        let parsed = parse_archive(&family(), 2024, raw.as_bytes()).unwrap();
        assert_eq!(parsed.rows_read, 2);
        assert!(parsed.defects.is_empty());
        assert_eq!(parsed.records.len(), 2);

        let wheat = &parsed.records[0];
        assert_eq!(wheat.contract, "WHEAT - CHICAGO BOARD OF TRADE");
        assert_eq!(wheat.date, date(2024, 1, 2));
        assert_eq!(wheat.values, vec![Some(1000.0), Some(300.0), Some(100.0), Some(200.0)]);

        assert_eq!(parsed.records[1].values[3], Some(-25.0));
    }

    #[test]
    fn test_empty_and_dot_cells_stay_null() {
        let raw = "\
Market and Exchange Names,As of Date in Form YYYY-MM-DD,Open Interest (All),Noncommercial Positions-Long (All),Noncommercial Positions-Short (All)
GOLD,2024-02-06,,.,5
";
        let parsed = parse_archive(&family(), 2024, raw.as_bytes()).unwrap();
        assert!(parsed.defects.is_empty());
        assert_eq!(parsed.records[0].values, vec![None, None, Some(5.0), None]);
    }

    #[test]
    fn test_garbage_number_is_null_with_defect() {
        let raw = "\
Market and Exchange Names,As of Date in Form YYYY-MM-DD,Open Interest (All),Noncommercial Positions-Long (All),Noncommercial Positions-Short (All)
GOLD,2024-02-06,n/a,10,5
";
        let parsed = parse_archive(&family(), 2024, raw.as_bytes()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].values[0], None);
        assert_eq!(parsed.defects.len(), 1);
        assert_eq!(
            parsed.defects[0].kind,
            DefectKind::InvalidNumber {
                column: "Open Interest".to_string()
            }
        );
        assert!(!parsed.defects[0].row_skipped());
        assert_eq!(parsed.rows_skipped(), 0);
    }

    #[test]
    fn test_bad_date_skips_only_that_row() {
        let raw = "\
Market and Exchange Names,As of Date in Form YYYY-MM-DD,Open Interest (All)
GOLD,2024-02-06,1
SILVER,not-a-date,2
COPPER,2024-02-13,3
";
        let parsed = parse_archive(&family(), 2024, raw.as_bytes()).unwrap();
        assert_eq!(parsed.rows_read, 3);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].contract, "COPPER");
        assert_eq!(parsed.defects.len(), 1);
        assert_eq!(parsed.defects[0].kind, DefectKind::UnparsableDate);
        assert_eq!(parsed.defects[0].line, 3);
        assert_eq!(parsed.rows_skipped(), 1);
    }

    #[test]
    fn test_missing_contract_name_skips_row() {
        let raw = "\
Market and Exchange Names,As of Date in Form YYYY-MM-DD,Open Interest (All)
,2024-02-06,1
";
        let parsed = parse_archive(&family(), 2024, raw.as_bytes()).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.defects[0].kind, DefectKind::MissingContract);
    }

    #[test]
    fn test_renamed_headers_and_extra_columns() {
        let raw = "\
\u{feff}Market_and_Exchange_Names,Unrelated_Column,AS OF DATE IN FORM YYMMDD,open_interest_all,NonComm_Positions_Short_All
OATS,zzz,60103,42,7
";
        let parsed = parse_archive(&family(), 2006, raw.as_bytes()).unwrap();
        assert!(parsed.defects.is_empty());
        let record = &parsed.records[0];
        assert_eq!(record.contract, "OATS");
        assert_eq!(record.date, date(2006, 1, 3));
        // Long column absent this year, so the derived net is absent too.
        assert_eq!(record.values, vec![Some(42.0), None, Some(7.0), None]);
    }

    #[test]
    fn test_falls_back_to_second_date_source() {
        let raw = "\
Market and Exchange Names,As of Date in Form YYYY-MM-DD,As of Date in Form YYMMDD,Open Interest (All)
RICE,,930223,1
RICE,02/02/1993,,2
";
        let parsed = parse_archive(&family(), 1993, raw.as_bytes()).unwrap();
        assert_eq!(parsed.records[0].date, date(1993, 2, 23));
        assert_eq!(parsed.records[1].date, date(1993, 2, 2));
    }

    #[test]
    fn test_thousands_separators_are_stripped() {
        let raw = "\
Market and Exchange Names,As of Date in Form YYYY-MM-DD,Open Interest (All)
GOLD,2024-02-06,\"1,234,567\"
";
        let parsed = parse_archive(&family(), 2024, raw.as_bytes()).unwrap();
        assert_eq!(parsed.records[0].values[0], Some(1_234_567.0));
    }

    #[test]
    fn test_missing_required_columns_is_schema_error() {
        let raw = "Open Interest (All)\n1\n";
        let err = parse_archive(&family(), 2024, raw.as_bytes()).unwrap_err();
        match err {
            CotError::Schema {
                family,
                year,
                missing,
            } => {
                assert_eq!(family, "tiny_fut");
                assert_eq!(year, 2024);
                assert_eq!(missing.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let raw = "\
Market and Exchange Names,As of Date in Form YYYY-MM-DD,Open Interest (All),Noncommercial Positions-Long (All)
GOLD,2024-02-06
";
        let parsed = parse_archive(&family(), 2024, raw.as_bytes()).unwrap();
        assert_eq!(parsed.records[0].values, vec![None, None, None, None]);
    }

    #[test]
    fn test_parse_number_cases() {
        assert_eq!(parse_number(""), Ok(None));
        assert_eq!(parse_number(" . "), Ok(None));
        assert_eq!(parse_number("-12.5"), Ok(Some(-12.5)));
        assert_eq!(parse_number("0"), Ok(Some(0.0)));
        assert_eq!(parse_number("abc"), Err(()));
        assert_eq!(parse_number("inf"), Err(()));
    }
}

use anyhow::Result;
use cot_reports_lib::{Catalog, Record, RecordView};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

#[derive(Tabled, Serialize)]
struct FamilyRow {
    #[tabled(rename = "Family")]
    #[serde(rename = "Family")]
    id: String,
    #[tabled(rename = "Since")]
    #[serde(rename = "Since")]
    first_year: i32,
    #[tabled(rename = "Schema")]
    #[serde(rename = "Schema")]
    schema: String,
    #[tabled(rename = "Description")]
    #[serde(rename = "Description")]
    description: String,
}

#[derive(Tabled, Serialize)]
struct ContractRow {
    #[tabled(rename = "Contract")]
    #[serde(rename = "Contract")]
    name: String,
}

// -- Row builders --

fn build_family_rows(catalog: &Catalog) -> Vec<FamilyRow> {
    catalog
        .families()
        .map(|f| FamilyRow {
            id: f.id().to_string(),
            first_year: f.first_year(),
            schema: f.schema().name().to_string(),
            description: f.description().to_string(),
        })
        .collect()
}

fn build_contract_rows<'a>(names: impl IntoIterator<Item = &'a String>) -> Vec<ContractRow> {
    names
        .into_iter()
        .map(|n| ContractRow { name: n.clone() })
        .collect()
}

/// Header plus one string row per record, for the dynamic report layout.
fn build_report_rows<'a>(
    columns: &[String],
    records: impl IntoIterator<Item = &'a Record>,
) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = Vec::with_capacity(columns.len() + 2);
    header.push("Date".to_string());
    header.push("Contract".to_string());
    header.extend(columns.iter().cloned());

    let rows = records
        .into_iter()
        .map(|r| {
            let mut cells = Vec::with_capacity(header.len());
            cells.push(r.date.to_string());
            cells.push(r.contract.clone());
            cells.extend(r.values.iter().map(|v| format_number(*v)));
            cells
        })
        .collect();
    (header, rows)
}

// -- Fixed-layout output --

fn print_rows<T: Tabled + Serialize>(rows: &[T], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Markdown => {
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Json => print_json(&rows),
    }
    Ok(())
}

pub fn print_families(catalog: &Catalog, format: &OutputFormat) -> Result<()> {
    print_rows(&build_family_rows(catalog), format)
}

pub fn print_contracts<'a>(
    names: impl IntoIterator<Item = &'a String>,
    format: &OutputFormat,
) -> Result<()> {
    print_rows(&build_contract_rows(names), format)
}

// -- Report output --

fn report_table<'a>(columns: &[String], records: impl IntoIterator<Item = &'a Record>) -> Table {
    let (header, rows) = build_report_rows(columns, records);
    let mut builder = Builder::default();
    builder.push_record(header);
    for row in rows {
        builder.push_record(row);
    }
    builder.build()
}

fn write_report_csv<'a, W: std::io::Write>(
    writer: W,
    columns: &[String],
    records: impl IntoIterator<Item = &'a Record>,
) -> Result<()> {
    let (header, rows) = build_report_rows(columns, records);
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&header)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn print_report(
    columns: &[String],
    views: &[RecordView<'_>],
    format: &OutputFormat,
) -> Result<()> {
    let records = views.iter().map(|v| v.record());
    match format {
        OutputFormat::Table => println!("{}", report_table(columns, records)),
        OutputFormat::Markdown => {
            let mut table = report_table(columns, records);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Csv => write_report_csv(std::io::stdout(), columns, records)?,
        OutputFormat::Json => print_json(&views),
    }
    Ok(())
}

// -- JSON output --

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

/// Positions and trader counts are whole numbers; percentages are not.
fn format_number(value: Option<f64>) -> String {
    match value {
        None => String::new(),
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{:.2}", v),
    }
}

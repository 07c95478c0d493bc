//! Static catalog of report families and their column schemas.
//!
//! The catalog is compiled in from `seed_data/report_families.yml` (same
//! `include_str!` pattern as any other seed data) and validated once when a
//! session is built. It is configuration, not logic: format drift across
//! archive years is absorbed by the per-field rename lists declared there.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::error::CotError;

/// Error types for catalog loading and validation.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to parse report catalog YAML: {0}")]
    YamlParse(#[from] serde_yml::Error),
    #[error("Duplicate report family in catalog: {0}")]
    DuplicateFamily(String),
    #[error("Report family '{family}' references unknown schema '{schema}'")]
    UnknownSchema { family: String, schema: String },
    #[error("Schema '{schema}' declares column '{column}' twice")]
    DuplicateColumn { schema: String, column: String },
    #[error("Derived column '{column}' in schema '{schema}' reads unknown field '{input}'")]
    UnknownDerivedInput {
        schema: String,
        column: String,
        input: String,
    },
    #[error("Schema '{schema}' declares no {what}")]
    Incomplete { schema: String, what: &'static str },
}

/// A source column that carries the report date, with the formats it has
/// been published in.
#[derive(Deserialize, Debug, Clone)]
pub struct DateSource {
    pub column: String,
    pub formats: Vec<String>,
}

/// A numeric output column and the source headers it has been published
/// under, newest first.
#[derive(Deserialize, Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub columns: Vec<String>,
}

/// A column computed as `long - short` after parsing.
#[derive(Deserialize, Debug, Clone)]
pub struct DerivedField {
    pub name: String,
    pub long: String,
    pub short: String,
}

#[derive(Deserialize, Debug)]
struct SchemaFile {
    contract_columns: Vec<String>,
    dates: Vec<DateSource>,
    fields: Vec<FieldSpec>,
    #[serde(default)]
    derived: Vec<DerivedField>,
}

#[derive(Deserialize, Debug)]
struct FamilyFile {
    id: String,
    description: String,
    schema: String,
    first_year: i32,
    archive: String,
    text_file: String,
}

/// Top-level structure of the catalog YAML file.
#[derive(Deserialize, Debug)]
struct CatalogFile {
    schemas: BTreeMap<String, SchemaFile>,
    families: Vec<FamilyFile>,
}

/// The fixed row layout shared by one or more report families.
#[derive(Debug)]
pub struct ReportSchema {
    name: String,
    contract_columns: Vec<String>,
    dates: Vec<DateSource>,
    fields: Vec<FieldSpec>,
    derived: Vec<DerivedField>,
    /// Output column names: source fields first, then derived fields.
    columns: Arc<[String]>,
}

impl ReportSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidate headers for the contract-name column.
    pub fn contract_columns(&self) -> &[String] {
        &self.contract_columns
    }

    pub fn dates(&self) -> &[DateSource] {
        &self.dates
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn derived(&self) -> &[DerivedField] {
        &self.derived
    }

    /// Ordered output column names every record's values line up with.
    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn from_file(name: &str, file: SchemaFile) -> Result<Self, CatalogError> {
        if file.contract_columns.is_empty() {
            return Err(CatalogError::Incomplete {
                schema: name.to_string(),
                what: "contract-name columns",
            });
        }
        if file.dates.is_empty() {
            return Err(CatalogError::Incomplete {
                schema: name.to_string(),
                what: "date columns",
            });
        }

        let mut seen = HashSet::new();
        for column in file
            .fields
            .iter()
            .map(|f| &f.name)
            .chain(file.derived.iter().map(|d| &d.name))
        {
            if !seen.insert(column.as_str()) {
                return Err(CatalogError::DuplicateColumn {
                    schema: name.to_string(),
                    column: column.clone(),
                });
            }
        }

        for derived in &file.derived {
            for input in [&derived.long, &derived.short] {
                if !file.fields.iter().any(|f| &f.name == input) {
                    return Err(CatalogError::UnknownDerivedInput {
                        schema: name.to_string(),
                        column: derived.name.clone(),
                        input: input.clone(),
                    });
                }
            }
        }

        let columns: Arc<[String]> = file
            .fields
            .iter()
            .map(|f| f.name.clone())
            .chain(file.derived.iter().map(|d| d.name.clone()))
            .collect();

        Ok(Self {
            name: name.to_string(),
            contract_columns: file.contract_columns,
            dates: file.dates,
            fields: file.fields,
            derived: file.derived,
            columns,
        })
    }
}

/// One published report family, e.g. `legacy_fut`.
#[derive(Debug)]
pub struct ReportFamily {
    id: String,
    description: String,
    first_year: i32,
    archive: String,
    text_file: String,
    schema: Arc<ReportSchema>,
}

impl ReportFamily {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// First calendar year with a published yearly archive.
    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    pub fn schema(&self) -> &ReportSchema {
        &self.schema
    }

    /// File name of the zip archive for `year`.
    pub fn archive_name(&self, year: i32) -> String {
        expand_template(&self.archive, year)
    }

    /// Name of the text entry inside the archive for `year`.
    pub fn text_file_name(&self, year: i32) -> String {
        expand_template(&self.text_file, year)
    }
}

fn expand_template(template: &str, year: i32) -> String {
    template
        .replace("{year}", &format!("{:04}", year))
        .replace("{yy}", &format!("{:02}", year.rem_euclid(100)))
}

/// Validated set of report families.
#[derive(Debug, Clone)]
pub struct Catalog {
    families: Vec<Arc<ReportFamily>>,
}

impl Catalog {
    /// Load the catalog embedded at compile time.
    pub fn builtin() -> Result<Self, CatalogError> {
        let yaml_content = include_str!("../../seed_data/report_families.yml");
        Self::from_yaml(yaml_content)
    }

    /// Parse and validate a catalog from YAML content.
    pub fn from_yaml(yaml_content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yml::from_str(yaml_content)?;

        let mut schemas = BTreeMap::new();
        for (name, schema) in file.schemas {
            let schema = ReportSchema::from_file(&name, schema)?;
            schemas.insert(name, Arc::new(schema));
        }

        let mut families = Vec::with_capacity(file.families.len());
        let mut seen_ids = HashSet::new();
        for family in file.families {
            if !seen_ids.insert(family.id.clone()) {
                return Err(CatalogError::DuplicateFamily(family.id));
            }
            let schema = schemas
                .get(&family.schema)
                .cloned()
                .ok_or_else(|| CatalogError::UnknownSchema {
                    family: family.id.clone(),
                    schema: family.schema.clone(),
                })?;
            families.push(Arc::new(ReportFamily {
                id: family.id,
                description: family.description,
                first_year: family.first_year,
                archive: family.archive,
                text_file: family.text_file,
                schema,
            }));
        }

        Ok(Self { families })
    }

    pub fn get(&self, id: &str) -> Option<Arc<ReportFamily>> {
        self.families.iter().find(|f| f.id == id).cloned()
    }

    /// Look up a family, failing with [`CotError::UnknownReportFamily`].
    pub fn family(&self, id: &str) -> Result<Arc<ReportFamily>, CotError> {
        self.get(id).ok_or_else(|| CotError::UnknownReportFamily {
            id: id.to_string(),
            known: self.ids().into_iter().map(str::to_string).collect(),
        })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.families.iter().map(|f| f.id.as_str()).collect()
    }

    pub fn families(&self) -> impl Iterator<Item = &Arc<ReportFamily>> {
        self.families.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
schemas:
  tiny:
    contract_columns: ["Market"]
    dates:
      - column: "Date"
        formats: ["%Y-%m-%d"]
    fields:
      - name: "Long"
        columns: ["Long_All"]
      - name: "Short"
        columns: ["Short_All"]
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
    text_file: "Tiny{yy}.txt"
"#;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(
            catalog.ids(),
            vec![
                "legacy_fut",
                "legacy_futopt",
                "disaggregated_fut",
                "disaggregated_futopt",
                "traders_in_financial_futures_fut",
                "traders_in_financial_futures_futopt",
            ]
        );
    }

    #[test]
    fn test_builtin_legacy_columns() {
        let catalog = Catalog::builtin().unwrap();
        let legacy = catalog.get("legacy_fut").unwrap();
        assert_eq!(legacy.first_year(), 1986);
        assert_eq!(legacy.archive_name(2024), "deacot2024.zip");
        assert_eq!(legacy.text_file_name(2024), "annual.txt");
        let columns = legacy.schema().columns();
        assert_eq!(columns[0], "Open Interest");
        assert_eq!(columns.last().unwrap(), "Net % of OI, Large Spec");
    }

    #[test]
    fn test_two_digit_year_template() {
        let catalog = Catalog::builtin().unwrap();
        let tff = catalog.get("traders_in_financial_futures_fut").unwrap();
        assert_eq!(tff.archive_name(2009), "fut_fin_txt_2009.zip");
        assert_eq!(tff.text_file_name(2009), "FinFut09.txt");
    }

    #[test]
    fn test_derived_columns_follow_fields() {
        let catalog = Catalog::from_yaml(SMALL).unwrap();
        let family = catalog.get("tiny_fut").unwrap();
        assert_eq!(&family.schema().columns()[..], ["Long", "Short", "Net"]);
        assert_eq!(family.schema().column_index("Net"), Some(2));
        assert_eq!(family.schema().column_index("Missing"), None);
    }

    #[test]
    fn test_unknown_family_lists_known_ids() {
        let catalog = Catalog::from_yaml(SMALL).unwrap();
        let err = catalog.family("legacy_fut").unwrap_err();
        match err {
            CotError::UnknownReportFamily { id, known } => {
                assert_eq!(id, "legacy_fut");
                assert_eq!(known, vec!["tiny_fut".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_family_rejected() {
        let yaml = format!(
            "{}  - id: tiny_fut\n    description: \"again\"\n    schema: tiny\n    first_year: 2021\n    archive: \"x\"\n    text_file: \"y\"\n",
            SMALL
        );
        let result = Catalog::from_yaml(&yaml);
        assert!(matches!(result.unwrap_err(), CatalogError::DuplicateFamily(_)));
    }

    #[test]
    fn test_unknown_schema_rejected() {
        let yaml = SMALL.replace("schema: tiny", "schema: huge");
        let result = Catalog::from_yaml(&yaml);
        assert!(matches!(
            result.unwrap_err(),
            CatalogError::UnknownSchema { .. }
        ));
    }

    #[test]
    fn test_derived_with_unknown_input_rejected() {
        let yaml = SMALL.replace("short: \"Short\"", "short: \"Shrt\"");
        let result = Catalog::from_yaml(&yaml);
        assert!(matches!(
            result.unwrap_err(),
            CatalogError::UnknownDerivedInput { .. }
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let yaml = SMALL.replace("name: \"Net\"", "name: \"Long\"");
        let result = Catalog::from_yaml(&yaml);
        assert!(matches!(
            result.unwrap_err(),
            CatalogError::DuplicateColumn { .. }
        ));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let result = Catalog::from_yaml("schemas: [");
        assert!(matches!(result.unwrap_err(), CatalogError::YamlParse(_)));
    }
}

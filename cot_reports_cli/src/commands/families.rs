use anyhow::Result;
use cot_reports_lib::Catalog;

use crate::output::{print_families, OutputFormat};

pub fn run(format: &OutputFormat) -> Result<()> {
    let catalog = Catalog::builtin()?;
    print_families(&catalog, format)
}

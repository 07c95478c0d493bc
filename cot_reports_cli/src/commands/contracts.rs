use anyhow::Result;
use clap::Args;
use cot_reports_lib::CommitmentsOfTraders;

use crate::output::{print_contracts, OutputFormat};

#[derive(Args)]
pub struct ContractsArgs {
    /// Report family (see `cot families`)
    #[arg(long, default_value = "legacy_fut")]
    pub family: String,

    /// Case-insensitive substring filter on contract names
    #[arg(long)]
    pub search: Option<String>,
}

pub async fn run(args: &ContractsArgs, format: &OutputFormat) -> Result<()> {
    let cot = CommitmentsOfTraders::new(&args.family)?;
    let names = cot.list_available_contracts().await?;
    let matched = matching_names(names.iter(), args.search.as_deref());

    if matched.is_empty() {
        eprintln!("No contracts match the given filter.");
        return Ok(());
    }
    print_contracts(matched, format)
}

fn matching_names<'a>(
    names: impl Iterator<Item = &'a String>,
    search: Option<&str>,
) -> Vec<&'a String> {
    match search {
        None => names.collect(),
        Some(needle) => {
            let needle = needle.to_lowercase();
            names
                .filter(|n| n.to_lowercase().contains(&needle))
                .collect()
        }
    }
}

use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use cot_reports_lib::{closest_contract_names, CommitmentsOfTraders, MergedReport, RecordView};
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::{print_report, OutputFormat};

#[derive(Args)]
pub struct ReportArgs {
    /// Report family (see `cot families`)
    #[arg(long, default_value = "legacy_fut")]
    pub family: String,

    /// Exact contract name; repeat for every historical name of the contract
    #[arg(long = "contract", required = true)]
    pub contracts: Vec<String>,

    /// Only show the newest N rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only show rows on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,
}

pub async fn run(args: &ReportArgs, format: &OutputFormat) -> Result<()> {
    let cot = CommitmentsOfTraders::new(&args.family)?;

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Loading {} archives", args.family));
    pb.enable_steady_tick(Duration::from_millis(120));
    let result = cot.report(args.contracts.iter().cloned()).await;
    pb.finish_and_clear();
    let report = result?;

    if report.is_empty() {
        eprintln!("No rows found for the given contract name(s).");
        suggest_names(&cot, &args.contracts).await;
        return Ok(());
    }

    let views = select_rows(&report, args.since, args.limit);
    if views.is_empty() {
        eprintln!("No rows on or after the given date.");
        return Ok(());
    }
    eprintln!(
        "{} of {} rows, {} to {}",
        views.len(),
        report.len(),
        views[views.len() - 1].record().date,
        views[0].record().date
    );

    print_report(report.columns(), &views, format)
}

/// Newest-first rows on or after `since`, at most `limit` of them.
fn select_rows(
    report: &MergedReport,
    since: Option<NaiveDate>,
    limit: Option<usize>,
) -> Vec<RecordView<'_>> {
    report
        .rows()
        .take_while(|v| since.map_or(true, |d| v.record().date >= d))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

async fn suggest_names(cot: &CommitmentsOfTraders, requested: &[String]) {
    let Ok(universe) = cot.list_available_contracts().await else {
        return;
    };
    for name in requested {
        let hits = closest_contract_names(name, universe.iter(), 3);
        if hits.is_empty() {
            continue;
        }
        eprintln!("Closest matches for '{}':", name);
        for hit in hits {
            eprintln!("  {}", hit);
        }
    }
}

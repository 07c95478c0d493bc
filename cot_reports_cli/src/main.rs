mod commands;
mod output;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "cot")]
#[command(about = "Query CFTC Commitments of Traders history")]
struct Cli {
    /// Output format: table, json, csv, or markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known report families
    Families,
    /// List contract names published in the latest year of a family
    Contracts(commands::contracts::ContractsArgs),
    /// Show every published row for one or more contract names
    Report(commands::report::ReportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cot_reports=info".parse()?)
                .add_directive("cftc_archive=warn".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "table" => OutputFormat::Table,
        "json" => OutputFormat::Json,
        "csv" => OutputFormat::Csv,
        "markdown" | "md" => OutputFormat::Markdown,
        other => bail!("Unknown output format '{}' (expected table, json, csv, or markdown)", other),
    };

    match &cli.command {
        Commands::Families => commands::families::run(&format)?,
        Commands::Contracts(args) => commands::contracts::run(args, &format).await?,
        Commands::Report(args) => commands::report::run(args, &format).await?,
    }

    Ok(())
}

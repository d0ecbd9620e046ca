// src/main.rs

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod attendance_client;
mod attendance_data;
mod report;
mod timesheet;

use attendance_client::{AttendanceSource, Config, FetchSequence, HttpAttendanceSource};
use timesheet::{build_view_model, period_range, ViewKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

/// Fetches raw punch events from the CRM attendance endpoint and renders
/// daily, weekly or monthly timesheet reports.
#[derive(Debug, Parser)]
#[command(name = "punchcard", version)]
struct Cli {
    /// Calendar granularity of the report.
    #[arg(long, value_enum, default_value_t = ViewKind::Weekly)]
    view: ViewKind,

    /// Anchor date (YYYY-MM-DD) the period is computed around; defaults to
    /// today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Restrict the report to a single employee (server-side filter).
    #[arg(long)]
    employee: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Loading PUNCHCARD_ configuration from environment")?;
    let source = HttpAttendanceSource::new(&config).context("Building attendance API client")?;

    let anchor = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let range = period_range(cli.view, anchor);
    info!(
        "Building {:?} report for {} to {}",
        cli.view, range.from, range.to
    );

    // Single fetch here, but responses still go through the sequencer so a
    // caller looping over ranges inherits last-request-wins semantics.
    let fetches = FetchSequence::new();
    let ticket = fetches.begin();
    let map = source
        .fetch_range(cli.employee.as_deref(), range.from, range.to)
        .await
        .context("Fetching attendance events")?;
    let map = fetches
        .accept(ticket, map)
        .context("Fetch response was superseded by a newer request")?;
    debug!("Fetched punch data for {} employee(s)", map.len());

    let view_model = build_view_model(&map, cli.view, &range);

    let rendered = match cli.format {
        OutputFormat::Table => report::render_table(&view_model),
        OutputFormat::Json => serde_json::to_string_pretty(&view_model)
            .context("Serializing view model to JSON")?,
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            report::write_csv(&mut buf, &view_model).context("Writing CSV report")?;
            String::from_utf8(buf).context("CSV output was not valid UTF-8")?
        }
    };

    match cli.output {
        Some(path) => {
            fs::write(&path, rendered)
                .with_context(|| format!("Writing report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

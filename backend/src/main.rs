//! Cancellations CLI
//!
//! # Main Commands
//!
//! ```bash
//! cancellations serve                          # HTTP server + 5 minute refresh
//! cancellations ingest book.xlsx -o rows.json  # One pass, enriched rows as JSON
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! cancellations sheets book.xlsx               # Sheets, headers, row counts
//! cancellations query book.xlsx --sheet Monday # One pass, filtered rows
//! ```

use cancellations::{
    process_workbook, run_pass, source_for_path, CancellationQuery, Settings, WithdrawalCounts,
};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "cancellations")]
#[command(about = "Class cancellations and withdrawal eligibility", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: CANCELLATIONS_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Workbook file or CSV sheet directory (default: CANCELLATIONS_SOURCE)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Seconds between ingestion passes (default: CANCELLATIONS_REFRESH_SECS or 300)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Run one ingestion pass and output enriched rows as JSON
    Ingest {
        /// Workbook file or CSV sheet directory
        source: PathBuf,

        /// Evaluate as of this date (DD/MM/YYYY, default: today)
        #[arg(long, value_parser = parse_day)]
        today: Option<NaiveDate>,

        /// Output file for rows (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the per-offering breakdown
        #[arg(long)]
        programs: Option<PathBuf>,
    },

    /// List sheets, headers and row counts of a source
    Sheets {
        /// Workbook file or CSV sheet directory
        source: PathBuf,
    },

    /// Run one pass and print the rows matching the filters
    Query {
        /// Workbook file or CSV sheet directory
        source: PathBuf,

        /// Evaluate as of this date (DD/MM/YYYY, default: today)
        #[arg(long, value_parser = parse_day)]
        today: Option<NaiveDate>,

        #[command(flatten)]
        filters: QueryArgs,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Program name contains
    #[arg(long)]
    program: Option<String>,

    /// Program id contains
    #[arg(long)]
    program_id: Option<String>,

    /// Sheet (day) equals
    #[arg(long)]
    sheet: Option<String>,

    /// Date range contains
    #[arg(long)]
    date: Option<String>,

    /// Active or Cancelled
    #[arg(long)]
    status: Option<String>,

    /// Only rows with (true) or without (false) cancellation dates
    #[arg(long)]
    has_cancellation: Option<bool>,
}

impl From<QueryArgs> for CancellationQuery {
    fn from(args: QueryArgs) -> Self {
        CancellationQuery {
            program: args.program,
            program_id: args.program_id,
            sheet: args.sheet,
            date: args.date,
            status: args.status,
            has_cancellation: args.has_cancellation,
        }
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%d/%m/%Y")
        .map_err(|e| format!("expected DD/MM/YYYY: {}", e))
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            port,
            source,
            interval_secs,
        } => cmd_serve(source, port, interval_secs).await,

        Commands::Ingest {
            source,
            today,
            output,
            programs,
        } => cmd_ingest(&source, today, output.as_deref(), programs.as_deref()),

        Commands::Sheets { source } => cmd_sheets(&source),

        Commands::Query {
            source,
            today,
            filters,
        } => cmd_query(&source, today, filters.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(
    source: Option<PathBuf>,
    port: Option<u16>,
    interval_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?.with_overrides(source, port, interval_secs)?;
    cancellations::server::start_server(settings).await?;
    Ok(())
}

fn cmd_ingest(
    source: &Path,
    today: Option<NaiveDate>,
    output: Option<&Path>,
    programs: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let source = source_for_path(source);
    let report = run_pass(source.as_ref(), today);

    if let cancellations::PassOutcome::SourceUnavailable { reason } = &report.outcome {
        return Err(format!("source unavailable: {}", reason).into());
    }

    let counts = WithdrawalCounts::tally(&report.rows);
    eprintln!("Rows: {}", report.rows.len());
    eprintln!("Offerings: {}", report.programs.len());
    eprintln!(
        "Withdrawal: {} Yes, {} No, {} cancelled",
        counts.yes, counts.no, counts.blank
    );

    let json = serde_json::to_string_pretty(&report.rows)?;
    write_output(&json, output)?;

    if let Some(path) = programs {
        let json = serde_json::to_string_pretty(&report.programs)?;
        fs::write(path, json)?;
        eprintln!("Offerings written to: {}", path.display());
    }

    Ok(())
}

fn cmd_sheets(source: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = source_for_path(source);
    let workbook = source.load()?;

    println!("{}", source.describe());
    for sheet in &workbook.sheets {
        println!("  {} ({} rows)", sheet.name, sheet.row_count());
        println!("     Columns: {}", sheet.headers.join(", "));
    }
    Ok(())
}

fn cmd_query(
    source: &Path,
    today: Option<NaiveDate>,
    query: CancellationQuery,
) -> Result<(), Box<dyn std::error::Error>> {
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let workbook = source_for_path(source).load()?;
    let report = process_workbook(&workbook, today);

    let rows = query.apply(&report.rows);
    eprintln!("{} of {} rows match", rows.len(), report.rows.len());
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

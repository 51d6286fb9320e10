//! CLI entry point for expense analysis.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use expense_analysis::loader::parse_day_first_date;
use expense_analysis::utils::format_currency;
use expense_analysis::{
    AnalysisSession, ChartTheme, FilterSelection, LoaderConfig, MetadataRow, Orientation,
    ReportOptions, SectionToggles,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// CLI-compatible metadata row mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMetadataRow {
    /// Skip the first line when it starts with a run of separators
    Auto,
    /// Always skip the first line
    Skip,
    /// The first line is the header
    Absent,
}

impl From<CliMetadataRow> for MetadataRow {
    fn from(cli: CliMetadataRow) -> Self {
        match cli {
            CliMetadataRow::Auto => MetadataRow::Auto,
            CliMetadataRow::Skip => MetadataRow::Skip,
            CliMetadataRow::Absent => MetadataRow::Absent,
        }
    }
}

/// CLI-compatible page orientation
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOrientation {
    Portrait,
    Landscape,
}

impl From<CliOrientation> for Orientation {
    fn from(cli: CliOrientation) -> Self {
        match cli {
            CliOrientation::Portrait => Orientation::Portrait,
            CliOrientation::Landscape => Orientation::Landscape,
        }
    }
}

/// Report sections that can be toggled
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliSection {
    Kpi,
    Region,
    Trainer,
    Client,
    Payment,
}

fn section_toggles(sections: &[CliSection]) -> SectionToggles {
    SectionToggles {
        kpi: sections.contains(&CliSection::Kpi),
        region: sections.contains(&CliSection::Region),
        trainer: sections.contains(&CliSection::Trainer),
        client: sections.contains(&CliSection::Client),
        payment: sections.contains(&CliSection::Payment),
    }
}

fn parse_date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_day_first_date(value).ok_or_else(|| format!("unrecognized date '{}'", value))
}

fn parse_separator(value: &str) -> std::result::Result<u8, String> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ => {
            let bytes = value.as_bytes();
            if bytes.len() == 1 {
                Ok(bytes[0])
            } else {
                Err(format!("separator must be a single byte, got '{}'", value))
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Expense analysis: summaries, charts, PDF report and CSV exports",
    long_about = "Analyze a trainer expense sheet.\n\n\
                  EXAMPLES:\n  \
                  # Full report and CSV exports\n  \
                  expense-analysis -i expenses.csv -o reports/\n\n  \
                  # One region over January, PDF only\n  \
                  expense-analysis -i expenses.csv --region North --from 01/01/2024 --to 31/01/2024 --pdf\n\n  \
                  # Summaries and chart specs as JSON\n  \
                  expense-analysis -i expenses.csv --json"
)]
struct Args {
    /// Path to the expense file
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the report and CSV files
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// First date to include (day-first or ISO)
    #[arg(long, value_parser = parse_date_arg)]
    from: Option<NaiveDate>,

    /// Last date to include (day-first or ISO)
    #[arg(long, value_parser = parse_date_arg)]
    to: Option<NaiveDate>,

    /// Keep only these regions (repeatable)
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Keep only these clients (repeatable)
    #[arg(long = "client")]
    clients: Vec<String>,

    /// Keep only these trainers (repeatable)
    #[arg(long = "trainer")]
    trainers: Vec<String>,

    /// Field separator of the input file (`tab` for tab-separated)
    #[arg(long, default_value = ",", value_parser = parse_separator)]
    separator: u8,

    /// How to treat the first line of the file
    #[arg(long, value_enum, default_value = "auto")]
    metadata_row: CliMetadataRow,

    /// Minimum leading separators that mark a metadata line in auto mode
    #[arg(long, default_value = "5")]
    metadata_run: usize,

    /// Page size (A0-A6, Letter, Legal); unknown names fall back to A4
    #[arg(long, default_value = "A4")]
    page_size: String,

    #[arg(long, value_enum, default_value = "portrait")]
    orientation: CliOrientation,

    /// Leave out the cover page
    #[arg(long)]
    no_cover: bool,

    /// Report sections to include (comma-separated); all when omitted
    #[arg(long, value_enum, value_delimiter = ',')]
    sections: Option<Vec<CliSection>>,

    /// Chart image width in pixels
    #[arg(long, default_value = "800")]
    chart_width: u32,

    /// Chart image height in pixels
    #[arg(long, default_value = "500")]
    chart_height: u32,

    /// Currency prefix for tables and chart labels
    #[arg(long, default_value = "Rs.")]
    currency: String,

    /// Write only the PDF report
    #[arg(long, conflicts_with = "csv")]
    pdf: bool,

    /// Write only the CSV exports
    #[arg(long)]
    csv: bool,

    /// Print the filter options for the current selection and exit
    #[arg(long)]
    list_options: bool,

    /// Output JSON to stdout instead of writing files
    ///
    /// Disables all progress logs; only the summaries and chart specs are
    /// printed. Useful for piping: `... --json | jq .summaries.kpis`
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn selection(&self) -> FilterSelection {
        let mut selection = FilterSelection::all()
            .with_regions(self.regions.iter().cloned())
            .with_clients(self.clients.iter().cloned())
            .with_trainers(self.trainers.iter().cloned());
        if self.from.is_some() || self.to.is_some() {
            selection.date_range = Some((
                self.from.unwrap_or(NaiveDate::MIN),
                self.to.unwrap_or(NaiveDate::MAX),
            ));
        }
        selection
    }

    fn report_options(&self) -> Result<ReportOptions> {
        let sections = self
            .sections
            .as_deref()
            .map(section_toggles)
            .unwrap_or_default();
        Ok(ReportOptions::builder()
            .page_size_name(&self.page_size)
            .orientation(self.orientation.into())
            .include_cover(!self.no_cover)
            .sections(sections)
            .chart_pixels(self.chart_width, self.chart_height)
            .build()?)
    }
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let loader_config = LoaderConfig::builder()
        .separator(args.separator)
        .metadata_row(args.metadata_row.into())
        .metadata_separator_run(args.metadata_run)
        .build()?;
    let report_options = args.report_options()?;

    let theme = ChartTheme {
        currency: args.currency.clone(),
        ..ChartTheme::default()
    };
    let mut builder = AnalysisSession::builder()
        .loader_config(loader_config)
        .theme(theme);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let mut session = builder.build()?;

    let load_summary = session.load_path(&args.input)?;
    if load_summary.rows_dropped > 0 {
        warn!(
            "{} rows dropped for an unparseable date or cost",
            load_summary.rows_dropped
        );
    }

    let selection = args.selection();
    if !selection.is_passthrough() {
        session.apply_filters(selection)?;
    }

    if args.list_options {
        return print_filter_options(&session);
    }

    if args.json {
        println!("{}", session.snapshot()?.to_json()?);
        return Ok(());
    }

    run_exports(&session, &args, &report_options)
}

/// Write the requested outputs and print a summary.
fn run_exports(session: &AnalysisSession, args: &Args, options: &ReportOptions) -> Result<()> {
    if !args.output.exists() {
        std::fs::create_dir_all(&args.output)?;
        info!("Created output directory: {}", args.output.display());
    }

    let write_pdf = !args.csv || args.pdf;
    let write_csv = !args.pdf || args.csv;
    let mut written: Vec<PathBuf> = Vec::new();

    if write_pdf {
        match session.generate_report(options) {
            Ok(document) => {
                let path = args.output.join(&document.file_name);
                std::fs::write(&path, &document.bytes)?;
                for chart in &document.omitted_charts {
                    warn!("Chart '{}' could not be rendered and was left out", chart);
                }
                info!("Report written to: {} ({} pages)", path.display(), document.page_count);
                written.push(path);
            }
            Err(e) => {
                error!("Error generating PDF: {}", e);
                return Err(anyhow!("Error generating PDF: {}", e));
            }
        }
    }

    if write_csv {
        written.extend(session.export_csv(&args.output)?);
    }

    print_human_readable_summary(session, &args.input, &args.currency, &written)
}

fn print_filter_options(session: &AnalysisSession) -> Result<()> {
    let options = session.filter_options(session.selection()?)?;

    println!();
    if let Some((min, max)) = options.date_bounds {
        println!("Dates:    {} to {}", min, max);
    }
    println!("Regions:  {}", options.regions.join(", "));
    println!("Clients:  {}", options.clients.join(", "));
    println!("Trainers: {}", options.trainers.join(", "));
    Ok(())
}

/// Print a human-readable summary of the analysis.
///
/// This is the default output when `--json` is not specified.
fn print_human_readable_summary(
    session: &AnalysisSession,
    input: &Path,
    currency: &str,
    written: &[PathBuf],
) -> Result<()> {
    let load_summary = session.load_summary()?;
    let summaries = session.summaries()?;
    let kpis = &summaries.kpis;

    println!();
    println!("{}", "=".repeat(80));
    println!("EXPENSE ANALYSIS COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input: {} ({} rows read, {} dropped)",
        input.display(),
        load_summary.rows_read,
        load_summary.rows_dropped
    );
    println!(
        "Selection: {} of {} rows",
        session.filtered_table()?.len(),
        session.raw_table()?.len()
    );
    println!();

    println!("Key Metrics:");
    println!("  Total Cost:           {}", format_currency(currency, kpis.total_cost));
    println!("  Total Sessions:       {}", kpis.session_count);
    println!("  Average Cost/Session: {}", format_currency(currency, kpis.average_cost));
    println!();

    if !summaries.regions.is_empty() {
        println!("Regions:");
        for region in &summaries.regions {
            println!(
                "  {:<20} {:>16}  {} sessions",
                region.label,
                format_currency(currency, region.total_cost),
                region.session_count
            );
        }
        println!();
    }

    if !written.is_empty() {
        println!("Files:");
        for path in written {
            println!("  - {}", path.display());
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
    Ok(())
}

//! Glucoflux CLI - Command-line interface for the glucose analytics engine
//!
//! Commands:
//! - import: Merge a vendor export into a JSON log file
//! - report: Build the analytics report for a log
//! - events: Correlate logged events with the CGM trace
//! - validate: Validate canonical import records
//! - convert: Convert a mmol/L value to a display unit
//! - doctor: Diagnose configuration and log health

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use glucoflux::adapters::{adapter_for, ImportAdapter, MySugrAdapter};
use glucoflux::config::AnalyticsConfig;
use glucoflux::schema::{RecordAdapter, SCHEMA_VERSION};
use glucoflux::types::EventEntry;
use glucoflux::units::{convert_unit, GlucoseUnit, Settings};
use glucoflux::{ComputeError, GlucoseProcessor, GLUCOFLUX_VERSION, PRODUCER_NAME};

/// Days of history analysed when no `--days` is given
const DEFAULT_RECENT_DAYS: i64 = 3;

/// Glucoflux - CGM/BGM log fusion, meal excursions and clinical summaries
#[derive(Parser)]
#[command(name = "glucoflux")]
#[command(version = GLUCOFLUX_VERSION)]
#[command(about = "Analyze glucose monitor exports", long_about = None)]
struct Cli {
    /// Analytics configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Offset from UTC for local timestamps and calendar days (minutes)
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a vendor export into a log file
    Import {
        /// Export source
        #[arg(long, value_enum)]
        source: SourceArg,

        /// Export file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Log file to merge into; created if missing
        #[arg(short, long)]
        log: PathBuf,

        /// Unit of the export readings (mySugr only)
        #[arg(long, value_enum, default_value = "mmol")]
        unit: UnitArg,
    },

    /// Build the analytics report for a log
    Report {
        /// Log file path (use - for stdin)
        #[arg(short, long)]
        log: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Correlate logged events with the CGM trace
    Events {
        /// Log file path (use - for stdin)
        #[arg(short, long)]
        log: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Validate canonical import records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a mmol/L value to a display unit
    Convert {
        /// Concentration in mmol/L
        value: f64,

        /// Target unit
        #[arg(long, value_enum, default_value = "mgdl")]
        unit: UnitArg,
    },

    /// Diagnose configuration and log health
    Doctor {
        /// Check a log file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Analyse only the last N days
    #[arg(long, conflicts_with = "all")]
    days: Option<i64>,

    /// Analyse the whole log
    #[arg(long)]
    all: bool,

    /// Reference time for the recent window (RFC 3339, defaults to now)
    #[arg(long)]
    now: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    /// LibreView CSV export
    Libreview,
    /// mySugr CSV export
    Mysugr,
    /// glucose.raw_record.v1 JSON array or NDJSON
    Records,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    /// mmol/L
    Mmol,
    /// mg/dL
    Mgdl,
}

impl From<UnitArg> for GlucoseUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Mmol => GlucoseUnit::MmolL,
            UnitArg::Mgdl => GlucoseUnit::MgDl,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), GlucofluxCliError> {
    let config = load_config(cli.config.as_deref(), cli.utc_offset_minutes)?;

    match cli.command {
        Commands::Import {
            source,
            input,
            log,
            unit,
        } => cmd_import(config, source, &input, &log, unit),

        Commands::Report {
            log,
            output,
            window,
            output_format,
        } => cmd_report(config, &log, &output, &window, output_format),

        Commands::Events {
            log,
            window,
            output_format,
        } => cmd_events(config, &log, &window, output_format),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Convert { value, unit } => cmd_convert(value, unit),

        Commands::Doctor { log, json } => cmd_doctor(&config, log.as_deref(), json),
    }
}

fn load_config(
    path: Option<&Path>,
    utc_offset_minutes: Option<i32>,
) -> Result<AnalyticsConfig, GlucofluxCliError> {
    let mut config = match path {
        Some(path) => AnalyticsConfig::from_json(&fs::read_to_string(path)?)?,
        None => AnalyticsConfig::default(),
    };

    if let Some(minutes) = utc_offset_minutes {
        config.utc_offset_minutes = minutes;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_import(
    config: AnalyticsConfig,
    source: SourceArg,
    input: &Path,
    log: &Path,
    unit: UnitArg,
) -> Result<(), GlucofluxCliError> {
    let raw = read_input(input)?;

    let mut processor = GlucoseProcessor::with_config(config)?;
    if log.exists() {
        processor.load_log(&fs::read_to_string(log)?)?;
    }

    let adapter: Box<dyn ImportAdapter> = match source {
        SourceArg::Libreview => adapter_for("libreview")?,
        SourceArg::Mysugr => Box::new(MySugrAdapter::with_unit(unit.into())),
        SourceArg::Records => adapter_for("records")?,
    };

    let added = processor.import(adapter.as_ref(), &raw)?;
    fs::write(log, processor.save_log()?)?;

    println!(
        "Imported {} new entries from {} ({} total)",
        added,
        adapter.source().as_str(),
        processor.log().len()
    );
    Ok(())
}

fn cmd_report(
    config: AnalyticsConfig,
    log: &Path,
    output: &Path,
    window: &WindowArgs,
    output_format: OutputFormat,
) -> Result<(), GlucofluxCliError> {
    let (processor, now) = open_log(config, log, window)?;
    let report = processor.report(now)?;

    let output_data = match output_format {
        OutputFormat::Ndjson | OutputFormat::Json => serde_json::to_string(&report)? + "\n",
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)? + "\n",
    };

    write_output(output, &output_data)
}

fn cmd_events(
    config: AnalyticsConfig,
    log: &Path,
    window: &WindowArgs,
    output_format: OutputFormat,
) -> Result<(), GlucofluxCliError> {
    let (processor, now) = open_log(config, log, window)?;
    let events = processor.events(now)?;

    if events.is_empty() {
        return Err(GlucofluxCliError::NoEvents);
    }

    print!("{}", format_output(&events, &output_format)?);
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), GlucofluxCliError> {
    let input_data = read_input(input)?;

    let records = match input_format {
        InputFormat::Ndjson => RecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RecordAdapter::parse_array(&input_data)?,
    };

    let results = RecordAdapter::validate_records(&records);

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                record_id: r.record_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.record_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(GlucofluxCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_convert(value: f64, unit: UnitArg) -> Result<(), GlucofluxCliError> {
    if !value.is_finite() {
        return Err(ComputeError::InvalidParameter(format!("not a concentration: {value}")).into());
    }

    let settings = Settings::with_unit(unit.into());
    println!("{} {}", convert_unit(value, &settings), settings.unit.label());
    Ok(())
}

fn cmd_doctor(
    config: &AnalyticsConfig,
    log: Option<&Path>,
    json: bool,
) -> Result<(), GlucofluxCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "glucoflux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Glucoflux version {}", GLUCOFLUX_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Record schema: {}", SCHEMA_VERSION),
    });

    let (low, high) = config.settings.display_range();
    checks.push(DoctorCheck {
        name: "config".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "UTC offset {} min, target range {}-{} {}, gap {} h",
            config.utc_offset_minutes,
            low,
            high,
            config.settings.unit.label(),
            config.gap_hours
        ),
    });

    if let Some(log_path) = log {
        checks.push(check_log(config, log_path));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for '-i -')".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: GLUCOFLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Glucoflux Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GlucofluxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_log(config: &AnalyticsConfig, log_path: &Path) -> DoctorCheck {
    if !log_path.exists() {
        return DoctorCheck {
            name: "log".to_string(),
            status: CheckStatus::Warning,
            message: "Log file does not exist".to_string(),
        };
    }

    let loaded = fs::read_to_string(log_path)
        .map_err(GlucofluxCliError::from)
        .and_then(|content| {
            let mut processor = GlucoseProcessor::with_config(config.clone())?;
            processor.load_log(&content)?;
            Ok(processor)
        });

    match loaded {
        Ok(processor) => {
            let log = processor.log();
            let cgm = log.iter().filter(|e| e.cgm.is_some()).count();
            let bgm = log.iter().filter(|e| e.bgm.is_some()).count();
            let events = log.iter().filter(|e| e.event_type.is_some()).count();
            DoctorCheck {
                name: "log".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Log valid ({} entries: {} cgm, {} bgm, {} events)",
                    log.len(),
                    cgm,
                    bgm,
                    events
                ),
            }
        }
        Err(e) => DoctorCheck {
            name: "log".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot load log: {}", CliError::from(e).message),
        },
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, GlucofluxCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), GlucofluxCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

/// Load a log and apply the recent-days window arguments
fn open_log(
    mut config: AnalyticsConfig,
    log: &Path,
    window: &WindowArgs,
) -> Result<(GlucoseProcessor, DateTime<Utc>), GlucofluxCliError> {
    config.recent_days = if window.all {
        None
    } else {
        Some(
            window
                .days
                .or(config.recent_days)
                .unwrap_or(DEFAULT_RECENT_DAYS),
        )
    };

    let now = match &window.now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ComputeError::DateParseError(format!("--now '{}': {}", raw, e)))?,
        None => Utc::now(),
    };

    let mut processor = GlucoseProcessor::with_config(config)?;
    processor.load_log(&read_input(log)?)?;
    Ok((processor, now))
}

fn format_output(events: &[EventEntry], format: &OutputFormat) -> Result<String, GlucofluxCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for event in events {
                lines.push(serde_json::to_string(event)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(events)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(events)?),
    }
}

// Error types

#[derive(Debug)]
enum GlucofluxCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for GlucofluxCliError {
    fn from(e: io::Error) -> Self {
        GlucofluxCliError::Io(e)
    }
}

impl From<ComputeError> for GlucofluxCliError {
    fn from(e: ComputeError) -> Self {
        GlucofluxCliError::Compute(e)
    }
}

impl From<serde_json::Error> for GlucofluxCliError {
    fn from(e: serde_json::Error) -> Self {
        GlucofluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GlucofluxCliError> for CliError {
    fn from(e: GlucofluxCliError) -> Self {
        match e {
            GlucofluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GlucofluxCliError::Compute(e) => compute_error(e),
            GlucofluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GlucofluxCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events with CGM data in the analysed window".to_string(),
                hint: Some("Widen the window with --days or --all".to_string()),
            },
            GlucofluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            GlucofluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn compute_error(e: ComputeError) -> CliError {
    let (code, hint) = match &e {
        ComputeError::ParseError(_) | ComputeError::MalformedRecord(_) => (
            "PARSE_ERROR",
            format!("Ensure input matches the {} schema", SCHEMA_VERSION),
        ),
        ComputeError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax".to_string()),
        ComputeError::CsvError(_) => (
            "CSV_ERROR",
            "Check the export was not edited or truncated".to_string(),
        ),
        ComputeError::DateParseError(_) => (
            "DATE_ERROR",
            "Use RFC 3339 timestamps such as 2024-01-15T08:00:00Z".to_string(),
        ),
        ComputeError::MissingBaseline(_) => (
            "MISSING_BASELINE",
            "Set baseline_policy to \"skip\" to drop events without CGM data".to_string(),
        ),
        ComputeError::InvalidParameter(_) => {
            ("INVALID_PARAMETER", "Check the configuration file".to_string())
        }
        ComputeError::UnsupportedSource(_) => (
            "UNSUPPORTED_SOURCE",
            "Supported sources: libreview, mysugr, records".to_string(),
        ),
    };

    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint),
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    record_id: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

//! Mousestyles CLI - Command-line interface for mouse behavioral recordings
//!
//! Commands:
//! - annotate: Attach interval-membership columns to a movement trace
//! - summary: Summarize an annotated trace
//! - intervals: Dump the episodes of one feature
//! - features: Dump the per-bin summary-feature table
//! - subjects: List recorded subject-days
//! - doctor: Diagnose the data directory layout

use clap::{Parser, Subcommand, ValueEnum};
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mousestyles::encoder::{AnnotationSummary, OutputFormat, TraceEncoder};
use mousestyles::features::FeatureTable;
use mousestyles::loader::SUMMARY_FILE;
use mousestyles::types::{IntervalRecord, IntoSubjectDay};
use mousestyles::{
    Config, DataError, DataStore, IntervalFeature, MovementProcessor, SubjectDay, PRODUCER_NAME,
    VERSION,
};

/// Mousestyles - behavioral recordings of laboratory mice
#[derive(Parser)]
#[command(name = "mousestyles")]
#[command(version = VERSION)]
#[command(about = "Load mouse movement traces and mark behavioral episodes", long_about = None)]
struct Cli {
    /// Root of the .npy data layout (overrides config and MOUSESTYLES_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable the worker pool
    #[arg(long, global = true)]
    sequential: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach interval-membership columns to a movement trace
    Annotate {
        #[command(flatten)]
        key: SubjectArgs,

        /// Comma separated features (default: configured list)
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<String>>,

        /// Output format (default: json-pretty on a terminal, ndjson otherwise)
        #[arg(long)]
        output_format: Option<Format>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize an annotated trace as JSON
    Summary {
        #[command(flatten)]
        key: SubjectArgs,

        /// Comma separated features (default: configured list)
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<String>>,
    },

    /// Dump the episodes of one feature
    Intervals {
        /// Feature code (AS, F, IS, M_AS, M_IS, W)
        #[arg(long)]
        feature: String,

        /// Restrict to one strain
        #[arg(long)]
        strain: Option<u32>,

        /// Restrict to one mouse
        #[arg(long)]
        mouse: Option<u32>,

        /// Restrict to one day
        #[arg(long)]
        day: Option<u32>,

        /// Output format
        #[arg(long)]
        output_format: Option<Format>,
    },

    /// Dump the per-bin summary-feature table
    Features {
        /// Output format
        #[arg(long)]
        output_format: Option<Format>,
    },

    /// List recorded subject-days
    Subjects,

    /// Diagnose the data directory layout
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct SubjectArgs {
    /// Strain number
    #[arg(long, allow_negative_numbers = true)]
    strain: f64,

    /// Mouse number within the strain
    #[arg(long, allow_negative_numbers = true)]
    mouse: f64,

    /// Day number
    #[arg(long, allow_negative_numbers = true)]
    day: f64,
}

impl SubjectArgs {
    fn subject(&self) -> Result<SubjectDay, DataError> {
        (self.strain, self.mouse, self.day).into_subject_day()
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Comma separated values
    Csv,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Ndjson => OutputFormat::Ndjson,
            Format::Json => OutputFormat::Json,
            Format::JsonPretty => OutputFormat::JsonPretty,
            Format::Csv => OutputFormat::Csv,
        }
    }
}

fn resolve_format(format: Option<Format>) -> OutputFormat {
    match format {
        Some(f) => f.into(),
        None if atty::is(atty::Stream::Stdout) => OutputFormat::JsonPretty,
        None => OutputFormat::Ndjson,
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliFailure> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env();

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.sequential {
        config.parallel = false;
    }
    debug!("using data directory {}", config.data_dir.display());
    Ok(config)
}

fn run(cli: Cli) -> Result<(), CliFailure> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Annotate {
            key,
            features,
            output_format,
            output,
        } => cmd_annotate(
            &config,
            &key,
            features,
            resolve_format(output_format),
            output.as_deref(),
        ),

        Commands::Summary { key, features } => cmd_summary(&config, &key, features),

        Commands::Intervals {
            feature,
            strain,
            mouse,
            day,
            output_format,
        } => cmd_intervals(
            &config,
            &feature,
            [strain, mouse, day],
            resolve_format(output_format),
        ),

        Commands::Features { output_format } => {
            cmd_features(&config, resolve_format(output_format))
        }

        Commands::Subjects => cmd_subjects(&config),

        Commands::Doctor { json } => cmd_doctor(&config, json),
    }
}

fn processor_for(config: &Config, features: Option<Vec<String>>) -> Result<MovementProcessor, CliFailure> {
    let features = match features {
        Some(names) => IntervalFeature::parse_list(&names)?,
        None => config.features.clone(),
    };
    Ok(MovementProcessor::new(DataStore::from_config(config), features).with_parallel(config.parallel))
}

fn cmd_annotate(
    config: &Config,
    key: &SubjectArgs,
    features: Option<Vec<String>>,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), CliFailure> {
    let subject = key.subject()?;
    let mut processor = processor_for(config, features)?;
    let annotated = processor.annotate(subject)?;
    write_output(output, &TraceEncoder::encode(&annotated, format)?)
}

fn cmd_summary(
    config: &Config,
    key: &SubjectArgs,
    features: Option<Vec<String>>,
) -> Result<(), CliFailure> {
    let subject = key.subject()?;
    let mut processor = processor_for(config, features)?;
    let annotated = processor.annotate(subject)?;
    println!("{}", AnnotationSummary::from_trace(&annotated).to_json()?);
    Ok(())
}

fn cmd_intervals(
    config: &Config,
    feature: &str,
    filter: [Option<u32>; 3],
    format: OutputFormat,
) -> Result<(), CliFailure> {
    let table = DataStore::from_config(config).load_intervals(feature)?;
    let [strain, mouse, day] = filter;
    let rows: Vec<&IntervalRecord> = table
        .rows()
        .iter()
        .filter(|r| strain.map_or(true, |s| r.strain == s))
        .filter(|r| mouse.map_or(true, |m| r.mouse == m))
        .filter(|r| day.map_or(true, |d| r.day == d))
        .collect();

    let text = match format {
        OutputFormat::Csv => {
            let mut out = String::from("strain,mouse,day,start,stop\n");
            for r in &rows {
                out.push_str(&format!("{},{},{},{},{}\n", r.strain, r.mouse, r.day, r.start, r.stop));
            }
            out
        }
        other => encode_records(&rows, other)?,
    };
    write_output(None, &text)
}

fn cmd_features(config: &Config, format: OutputFormat) -> Result<(), CliFailure> {
    let table = DataStore::from_config(config).load_all_features()?;

    let text = match format {
        OutputFormat::Csv => {
            let mut out = FeatureTable::columns().join(",");
            out.push('\n');
            for r in table.rows() {
                let values: Vec<String> = r.values().iter().map(|v| v.to_string()).collect();
                out.push_str(&format!(
                    "{},{},{},{},{}\n",
                    r.strain,
                    r.mouse,
                    r.day,
                    r.hour,
                    values.join(",")
                ));
            }
            out
        }
        other => encode_records(table.rows(), other)?,
    };
    write_output(None, &text)
}

fn cmd_subjects(config: &Config) -> Result<(), CliFailure> {
    let subjects = DataStore::from_config(config).subject_days()?;
    let mut out = String::new();
    for s in subjects {
        out.push_str(&format!("{}\t{}\t{}\n", s.strain, s.mouse, s.day));
    }
    write_output(None, &out)
}

fn cmd_doctor(config: &Config, json: bool) -> Result<(), CliFailure> {
    let store = DataStore::from_config(config);
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, VERSION),
    });

    if !store.root().is_dir() {
        checks.push(DoctorCheck {
            name: "data_dir".to_string(),
            status: CheckStatus::Error,
            message: format!("{} is not a directory", store.root().display()),
        });
    } else {
        checks.push(DoctorCheck {
            name: "data_dir".to_string(),
            status: CheckStatus::Ok,
            message: format!("{}", store.root().display()),
        });

        for feature in IntervalFeature::ALL {
            let dir = store.intervals_dir(feature);
            let count = count_arrays(&dir);
            checks.push(match count {
                Some(n) if n > 0 => DoctorCheck {
                    name: format!("intervals_{}", feature),
                    status: CheckStatus::Ok,
                    message: format!("{} interval files", n),
                },
                _ => DoctorCheck {
                    name: format!("intervals_{}", feature),
                    status: CheckStatus::Warning,
                    message: format!("no interval files in {}", dir.display()),
                },
            });
        }

        checks.push(match store.subject_days() {
            Ok(subjects) if !subjects.is_empty() => DoctorCheck {
                name: "movement".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} subject-days with movement traces", subjects.len()),
            },
            Ok(_) => DoctorCheck {
                name: "movement".to_string(),
                status: CheckStatus::Warning,
                message: "no movement traces found".to_string(),
            },
            Err(e) => DoctorCheck {
                name: "movement".to_string(),
                status: CheckStatus::Warning,
                message: format!("cannot list movement traces: {}", e),
            },
        });

        let summary = store.root().join(SUMMARY_FILE);
        checks.push(if summary.is_file() {
            DoctorCheck {
                name: "summary_features".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} present", SUMMARY_FILE),
            }
        } else {
            DoctorCheck {
                name: "summary_features".to_string(),
                status: CheckStatus::Warning,
                message: format!("{} not found", SUMMARY_FILE),
            }
        });
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        data_dir: store.root().display().to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Mousestyles Doctor Report");
        println!("=========================");
        println!("Version:  {}", report.version);
        println!("Data dir: {}", report.data_dir);
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CliFailure::DoctorFailed)
    } else {
        Ok(())
    }
}

fn count_arrays(dir: &Path) -> Option<usize> {
    let entries = fs::read_dir(dir).ok()?;
    Some(
        entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".npy"))
            .count(),
    )
}

fn encode_records<T: serde::Serialize>(rows: &[T], format: OutputFormat) -> Result<String, CliFailure> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(rows)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(rows)?,
        OutputFormat::Ndjson | OutputFormat::Csv => {
            let mut out = String::new();
            for row in rows {
                out.push_str(&serde_json::to_string(row)?);
                out.push('\n');
            }
            out
        }
    })
}

fn write_output(path: Option<&Path>, text: &str) -> Result<(), CliFailure> {
    match path {
        Some(p) if p.to_string_lossy() != "-" => fs::write(p, text)?,
        _ => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(text.as_bytes())?;
            if !text.is_empty() && !text.ends_with('\n') {
                handle.write_all(b"\n")?;
            }
            handle.flush()?;
        }
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum CliFailure {
    Io(io::Error),
    Data(DataError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for CliFailure {
    fn from(e: io::Error) -> Self {
        CliFailure::Io(e)
    }
}

impl From<DataError> for CliFailure {
    fn from(e: DataError) -> Self {
        CliFailure::Data(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliFailure::Data(e) => {
                let (code, hint) = match &e {
                    DataError::InvalidFeature { .. } => {
                        ("INVALID_FEATURE", Some("Use one of AS, F, IS, M_AS, M_IS, W"))
                    }
                    DataError::InvalidSubjectKey(_) => (
                        "INVALID_SUBJECT_KEY",
                        Some("Strain, mouse and day must be nonnegative integers"),
                    ),
                    DataError::MissingIntervalData(_) | DataError::MissingMovementData(_) => {
                        ("MISSING_DATA", Some("Run 'mousestyles doctor' to check the data directory"))
                    }
                    DataError::InvalidInterval(_) => ("INVALID_INTERVAL", None),
                    DataError::ArrayFormat(_) | DataError::ShapeMismatch(_) => {
                        ("ARRAY_ERROR", Some("Check that the .npy files are intact"))
                    }
                    DataError::InvalidFilename(_) => (
                        "INVALID_FILENAME",
                        Some("Interval files must end in strain{S}_mouse{M}_day{D}.npy"),
                    ),
                    DataError::Io(_) => ("IO_ERROR", Some("Check file paths and permissions")),
                    DataError::JsonError(_) => ("JSON_ERROR", Some("Check JSON syntax")),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CliFailure::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    data_dir: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

//! Morphmm CLI - Command-line interface for morphmetrics
//!
//! Commands:
//! - compute: Score pre-extracted feature rows and emit a metrics report
//! - validate: Validate feature-row input against morph.feature_row.v1
//! - doctor: Diagnose engine and schema versions

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use morphmetrics::collector::MIN_SEQUENCE_FILES;
use morphmetrics::pipeline::MorphProcessor;
use morphmetrics::schema::{self, RawFeatureRow};
use morphmetrics::types::PipelineOptions;
use morphmetrics::{MetricsError, ENGINE_VERSION, PRODUCER_NAME, SCHEMA_VERSION};

/// Morphmm - morphing-quality metrics for audio interpolation sequences
#[derive(Parser)]
#[command(name = "morphmm")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score how smoothly and linearly timbre features morph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute morphing metrics from pre-extracted feature rows
    Compute {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "report")]
        output_format: OutputFormat,

        /// Divide each metric column by its per-kind mean across sequences
        #[arg(long)]
        normalize: bool,

        /// Emit negated smoothness/linearity metrics instead of the
        /// "non-" framed ones
        #[arg(long)]
        negated: bool,

        /// Disable log-scaling of wide-range positive feature columns
        #[arg(long)]
        no_log_scale: bool,

        /// Disable per-column standardization
        #[arg(long)]
        no_standardize: bool,
    },

    /// Validate feature-row input against the morph.feature_row.v1 schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose engine health and versions
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one feature row per line)
    Ndjson,
    /// JSON array of feature rows
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Versioned metrics report (pretty JSON)
    Report,
    /// Newline-delimited JSON (one metric record per line)
    Ndjson,
    /// JSON array of metric records
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), MorphCliError> {
    match cli.command {
        Commands::Compute {
            input,
            output,
            input_format,
            output_format,
            normalize,
            negated,
            no_log_scale,
            no_standardize,
        } => cmd_compute(
            &input,
            &output,
            input_format,
            output_format,
            PipelineOptions {
                skip_toolbox: false,
                positive_metrics: !negated,
                normalize,
                log_scale: !no_log_scale,
                standardize: !no_standardize,
            },
        ),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { json } => cmd_doctor(json),
    }
}

fn cmd_compute(
    input: &PathBuf,
    output: &PathBuf,
    input_format: InputFormat,
    output_format: OutputFormat,
    options: PipelineOptions,
) -> Result<(), MorphCliError> {
    let input_data = read_input(input)?;

    let rows = match input_format {
        InputFormat::Ndjson => schema::parse_ndjson(&input_data)?,
        InputFormat::Json => schema::parse_json_array(&input_data)?,
    };
    if rows.is_empty() {
        return Err(MorphCliError::NoRows);
    }

    let processor = MorphProcessor::new(options);
    let (metrics, _features) = processor.process_rows(rows)?;

    let output_data = match output_format {
        OutputFormat::Report => {
            let mut json = processor.encode_report_json(&metrics)?;
            json.push('\n');
            json
        }
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in &metrics.records {
                lines.push(serde_json::to_string(record)?);
            }
            lines.join("\n") + "\n"
        }
        OutputFormat::Json => serde_json::to_string(&metrics.records)?,
    };

    if output.to_string_lossy() == "-" {
        print!("{output_data}");
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &PathBuf, json: bool) -> Result<(), MorphCliError> {
    let input_data = read_input(input)?;

    let mut total_rows = 0;
    let mut errors: Vec<ValidationErrorDetail> = Vec::new();
    let mut sequence_counts: std::collections::BTreeMap<usize, usize> = Default::default();

    for (index, line) in input_data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        total_rows += 1;

        match serde_json::from_str::<RawFeatureRow>(line) {
            Ok(row) => {
                if let Err(e) = row.validate() {
                    errors.push(ValidationErrorDetail {
                        line: index + 1,
                        error: e.to_string(),
                    });
                } else {
                    *sequence_counts.entry(row.sequence_index).or_insert(0) += 1;
                }
            }
            Err(e) => errors.push(ValidationErrorDetail {
                line: index + 1,
                error: e.to_string(),
            }),
        }
    }

    for (sequence_index, count) in &sequence_counts {
        if *count < MIN_SEQUENCE_FILES {
            errors.push(ValidationErrorDetail {
                line: 0,
                error: format!(
                    "sequence {sequence_index} has {count} rows, at least {MIN_SEQUENCE_FILES} required"
                ),
            });
        }
    }

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_rows,
        sequences: sequence_counts.len(),
        invalid_rows: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:       {}", report.schema_version);
        println!("Total rows:   {}", report.total_rows);
        println!("Sequences:    {}", report.sequences);
        println!("Invalid rows: {}", report.invalid_rows);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                if err.line > 0 {
                    println!("  - line {}: {}", err.line, err.error);
                } else {
                    println!("  - {}", err.error);
                }
            }
        }
    }

    if report.invalid_rows > 0 {
        Err(MorphCliError::ValidationFailed(report.invalid_rows))
    } else {
        Ok(())
    }
}

fn cmd_doctor(json: bool) -> Result<(), MorphCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("morphmetrics version {ENGINE_VERSION}"),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {SCHEMA_VERSION}"),
    });

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
            message: "stdin is a pipe (streaming input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Morphmm Doctor Report");
        println!("=====================");
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

    Ok(())
}

fn read_input(input: &PathBuf) -> Result<String, MorphCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

// Error types

#[derive(Debug)]
enum MorphCliError {
    Io(io::Error),
    Metrics(MetricsError),
    Json(serde_json::Error),
    NoRows,
    ValidationFailed(usize),
}

impl From<io::Error> for MorphCliError {
    fn from(e: io::Error) -> Self {
        MorphCliError::Io(e)
    }
}

impl From<MetricsError> for MorphCliError {
    fn from(e: MetricsError) -> Self {
        MorphCliError::Metrics(e)
    }
}

impl From<serde_json::Error> for MorphCliError {
    fn from(e: serde_json::Error) -> Self {
        MorphCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MorphCliError> for CliError {
    fn from(e: MorphCliError) -> Self {
        match e {
            MorphCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MorphCliError::Metrics(e) => CliError {
                code: "METRICS_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'morphmm validate' on the input for details".to_string()),
            },
            MorphCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MorphCliError::NoRows => CliError {
                code: "NO_ROWS".to_string(),
                message: "No feature rows found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            MorphCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} rows failed validation"),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_rows: usize,
    sequences: usize,
    invalid_rows: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    /// 1-based input line, or 0 for batch-level errors
    line: usize,
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
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

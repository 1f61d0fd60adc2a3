//! Motion CLI - Command-line interface for Synheart Motion
//!
//! Commands:
//! - replay: Count reps in a recorded frame file (batch mode)
//! - run: Process streaming frames from stdin (streaming mode)
//! - validate: Validate frame schema
//! - doctor: Diagnose engine health and configuration
//! - exercises: List registered exercises

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_motion::bar::BarReference;
use synheart_motion::calibration::CalibrationStore;
use synheart_motion::classifiers::ClassifierRegistry;
use synheart_motion::config::EngineConfig;
use synheart_motion::pipeline::{FrameReport, MotionProcessor};
use synheart_motion::schema::{FrameAdapter, FrameEvent, SCHEMA_VERSION};
use synheart_motion::types::LandmarkFrame;
use synheart_motion::{MotionError, MOTION_VERSION, PRODUCER_NAME};

/// Motion - On-device repetition counting from pose landmarks
#[derive(Parser)]
#[command(name = "motion")]
#[command(author = "Synheart AI Inc")]
#[command(version = MOTION_VERSION)]
#[command(about = "Count exercise reps from pose landmark frames", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count reps in a recorded frame file (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path for the session summary (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Exercise id (e.g. squat, jumping_jack, pull_up)
        #[arg(short, long)]
        exercise: String,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Write one NDJSON report per processed frame to this file
        #[arg(long)]
        reports: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Process streaming frames from stdin (streaming mode)
    Run {
        /// Exercise id (e.g. squat, jumping_jack, pull_up)
        #[arg(short, long)]
        exercise: String,

        /// Emit a report for every frame, not only decisions
        #[arg(long)]
        all_frames: bool,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Validate frame schema
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

    /// Diagnose engine health and configuration
    Doctor {
        /// Check config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check calibrations file
        #[arg(long)]
        calibrations: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered exercises
    Exercises {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Options shared by the processing commands
#[derive(Args)]
struct EngineArgs {
    /// Engine config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the landmark smoothing factor (0-1]
    #[arg(long)]
    smoothing_alpha: Option<f64>,

    /// Override the minimum landmark confidence
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Calibrate hands-free when the exercise has no profile
    #[arg(long)]
    auto_calibrate: bool,

    /// Load calibration profiles from file
    #[arg(long)]
    load_calibrations: Option<PathBuf>,

    /// Save calibration profiles to file after processing
    #[arg(long)]
    save_calibrations: Option<PathBuf>,

    /// Bar reference as "y" or "y,x0,x1" (pull-up style exercises)
    #[arg(long)]
    bar: Option<BarReference>,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
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

fn run(cli: Cli) -> Result<(), MotionCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            exercise,
            input_format,
            output_format,
            reports,
            engine,
        } => cmd_replay(
            &input,
            &output,
            &exercise,
            input_format,
            output_format,
            reports.as_deref(),
            &engine,
        ),

        Commands::Run {
            exercise,
            all_frames,
            flush,
            engine,
        } => cmd_run(&exercise, all_frames, flush, &engine),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            calibrations,
            json,
        } => cmd_doctor(config.as_deref(), calibrations.as_deref(), json),

        Commands::Exercises { json } => cmd_exercises(json),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    exercise: &str,
    input_format: InputFormat,
    output_format: OutputFormat,
    reports: Option<&Path>,
    engine: &EngineArgs,
) -> Result<(), MotionCliError> {
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Ndjson => FrameAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => FrameAdapter::parse_array(&input_data)?,
    };

    if events.is_empty() {
        return Err(MotionCliError::NoFrames);
    }

    let frames = FrameAdapter::to_landmark_frames(events)?;
    let mut processor = build_processor(engine, exercise)?;

    let mut report_lines: Vec<String> = Vec::new();
    for frame in &frames {
        if let Some(report) = processor.process_frame(frame) {
            if reports.is_some() {
                report_lines.push(serde_json::to_string(&report)?);
            }
        }
    }

    if let Some(reports_path) = reports {
        fs::write(reports_path, report_lines.join("\n") + "\n")?;
    }

    save_calibrations(&processor, engine)?;

    let summary = processor.finish_session()?;
    let output_data = match output_format {
        OutputFormat::Json => serde_json::to_string(&summary)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&summary)?,
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    exercise: &str,
    all_frames: bool,
    flush: bool,
    engine: &EngineArgs,
) -> Result<(), MotionCliError> {
    let mut processor = build_processor(engine, exercise)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: FrameEvent = serde_json::from_str(trimmed).map_err(|e| {
            MotionCliError::ParseError(format!("Failed to parse frame: {}", e))
        })?;
        event.validate()?;

        let Some(report) = processor.process_frame(&LandmarkFrame::from(event)) else {
            continue;
        };

        if all_frames || is_notable(&report) {
            writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    save_calibrations(&processor, engine)?;

    let summary = processor.finish_session()?;
    writeln!(stdout, "{}", serde_json::to_string(&summary)?)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), MotionCliError> {
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Ndjson => FrameAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => FrameAdapter::parse_array(&input_data)?,
    };

    let results = FrameAdapter::validate_frames(&events);

    let report = ValidationReport {
        total_frames: events.len(),
        valid_frames: events.len() - results.len(),
        invalid_frames: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                frame_id: r.frame_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Frame {} (index {}): {}",
                    err.frame_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(MotionCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    calibrations: Option<&Path>,
    json: bool,
) -> Result<(), MotionCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "motion_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Motion version {}", MOTION_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    checks.push(DoctorCheck {
        name: "exercises".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "{} exercises registered",
            ClassifierRegistry::with_defaults().ids().count()
        ),
    });

    if let Some(config_path) = config {
        checks.push(check_file("config", config_path, |content| {
            EngineConfig::from_json(content).map(|c| {
                format!(
                    "Config file valid (smoothing alpha {}, min confidence {})",
                    c.smoothing_alpha, c.min_confidence
                )
            })
        }));
    }

    if let Some(calibrations_path) = calibrations {
        checks.push(check_file("calibrations", calibrations_path, |content| {
            CalibrationStore::from_json(content)
                .map(|store| format!("Calibrations file valid ({} profiles)", store.len()))
                .map_err(MotionError::from)
        }));
    }

    // Check stdin is available (for streaming mode)
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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: MOTION_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Motion Doctor Report");
        println!("====================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(MotionCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_exercises(json: bool) -> Result<(), MotionCliError> {
    let registry = ClassifierRegistry::with_defaults();
    let exercises: Vec<ExerciseInfo> = registry
        .iter()
        .map(|c| {
            let timing = c.timing();
            ExerciseInfo {
                id: c.id().to_string(),
                family: c.family().as_str().to_string(),
                calibration_steps: c.calibration_steps(),
                min_phase_ms: timing.min_phase_ms,
                min_rep_ms: timing.min_rep_ms,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&exercises)?);
    } else {
        println!("{:<14} {:<18} {:<16} {:>10}", "ID", "FAMILY", "CALIBRATION", "MIN REP");
        for e in &exercises {
            println!(
                "{:<14} {:<18} {:<16} {:>8}ms",
                e.id,
                e.family,
                e.calibration_steps.join("/"),
                e.min_rep_ms
            );
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, MotionCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn build_processor(engine: &EngineArgs, exercise: &str) -> Result<MotionProcessor, MotionCliError> {
    let mut config = match &engine.config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(alpha) = engine.smoothing_alpha {
        config.smoothing_alpha = alpha;
    }
    if let Some(confidence) = engine.min_confidence {
        config.min_confidence = confidence;
    }
    if engine.auto_calibrate {
        config.auto_calibrate = true;
    }

    let mut processor = MotionProcessor::with_config(config)?;

    // Profiles must be in place before selection so auto-calibration sees them
    if let Some(calibrations_path) = &engine.load_calibrations {
        processor.load_calibrations(&fs::read_to_string(calibrations_path)?)?;
    }

    processor.select_exercise(exercise)?;

    if let Some(bar) = engine.bar {
        processor.set_bar(bar);
    }

    Ok(processor)
}

fn save_calibrations(processor: &MotionProcessor, engine: &EngineArgs) -> Result<(), MotionCliError> {
    if let Some(calibrations_path) = &engine.save_calibrations {
        fs::write(calibrations_path, processor.save_calibrations()?)?;
    }
    Ok(())
}

fn is_notable(report: &FrameReport) -> bool {
    !report.decision.is_none() || report.bar_event.is_some()
}

fn check_file<F>(name: &str, path: &Path, parse: F) -> DoctorCheck
where
    F: FnOnce(&str) -> Result<String, MotionError>,
{
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} file does not exist", name),
        };
    }

    match fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(message) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message,
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid {} file: {}", name, e),
            },
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {} file: {}", name, e),
        },
    }
}

// Error types

#[derive(Debug)]
enum MotionCliError {
    Io(io::Error),
    Engine(MotionError),
    Json(serde_json::Error),
    Validation(synheart_motion::schema::ValidationError),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for MotionCliError {
    fn from(e: io::Error) -> Self {
        MotionCliError::Io(e)
    }
}

impl From<MotionError> for MotionCliError {
    fn from(e: MotionError) -> Self {
        MotionCliError::Engine(e)
    }
}

impl From<serde_json::Error> for MotionCliError {
    fn from(e: serde_json::Error) -> Self {
        MotionCliError::Json(e)
    }
}

impl From<synheart_motion::schema::ValidationError> for MotionCliError {
    fn from(e: synheart_motion::schema::ValidationError) -> Self {
        MotionCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MotionCliError> for CliError {
    fn from(e: MotionCliError) -> Self {
        match e {
            MotionCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MotionCliError::Engine(e) => {
                let hint = match &e {
                    MotionError::UnknownExercise(_) => "Run 'motion exercises' for valid ids",
                    MotionError::ConfigError(_) => "Run 'motion doctor --config <file>' for details",
                    MotionError::BarReferenceError(_) => "Pass --bar as 'y' or 'y,x0,x1'",
                    _ => "Ensure input matches pose.frame.v1 schema",
                };
                CliError {
                    code: "ENGINE_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            MotionCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MotionCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'motion validate' for details".to_string()),
            },
            MotionCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            MotionCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            MotionCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            MotionCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    frame_id: Option<String>,
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

#[derive(serde::Serialize)]
struct ExerciseInfo {
    id: String,
    family: String,
    calibration_steps: [&'static str; 2],
    min_phase_ms: u64,
    min_rep_ms: u64,
}

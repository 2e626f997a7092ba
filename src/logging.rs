/// Structured logging for the seabird results pipeline
///
/// Routes the `log` facade through a `fern` dispatcher. Messages carry the
/// pipeline stage and, where relevant, the table or layer they concern.
/// Supports console output and an append-mode log file for scheduled runs.

use crate::error::SinkError;
use chrono::Utc;
use serde::Deserialize;
use std::fmt;

const TARGET: &str = "seabird";

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Source,
    Qaqc,
    Disturbance,
    Population,
    Sink,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Source => write!(f, "SRC"),
            Stage::Qaqc => write!(f, "QAQC"),
            Stage::Disturbance => write!(f, "DIST"),
            Stage::Population => write!(f, "POP"),
            Stage::Sink => write!(f, "DB"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Rows did not fit the destination schema - fix the data or the schema
    Validation,
    /// The sink could not be reached or dropped the connection
    Communication,
    /// Cannot tell from the error alone
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Validation => write!(f, "VALIDATION"),
            FailureType::Communication => write!(f, "COMMUNICATION"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Initialize the global logger.
///
/// Info and debug go to stdout, warnings and errors to stderr. With
/// `console_timestamps` off, console lines are short; the log file always
/// gets the full timestamped entry.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            if console_timestamps {
                out.finish(format_args!(
                    "{} {} {}",
                    Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                    record.level(),
                    message
                ))
            } else {
                match record.level() {
                    log::Level::Error => out.finish(format_args!("   ✗ {}", message)),
                    log::Level::Warn => out.finish(format_args!("   ⚠ {}", message)),
                    _ => out.finish(format_args!("   {}", message)),
                }
            }
        })
        .chain(
            fern::Dispatch::new()
                .filter(|meta| meta.level() > log::Level::Warn)
                .chain(std::io::stdout()),
        )
        .chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Warn)
                .chain(std::io::stderr()),
        );

    let mut dispatch = fern::Dispatch::new()
        .level(min_level.into())
        .chain(console);

    if let Some(path) = log_file {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {} {}",
                        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                        record.level(),
                        message
                    ))
                })
                .chain(fern::log_file(path)?),
        );
    }

    dispatch.apply()?;
    Ok(())
}

fn format_entry(stage: Stage, context: Option<&str>, message: &str) -> String {
    let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
    format!("{}{}: {}", stage, context_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(stage: Stage, context: Option<&str>, message: &str) {
    log::info!(target: TARGET, "{}", format_entry(stage, context, message));
}

/// Log a warning message
pub fn warn(stage: Stage, context: Option<&str>, message: &str) {
    log::warn!(target: TARGET, "{}", format_entry(stage, context, message));
}

/// Log an error message
pub fn error(stage: Stage, context: Option<&str>, message: &str) {
    log::error!(target: TARGET, "{}", format_entry(stage, context, message));
}

/// Log a debug message
pub fn debug(stage: Stage, context: Option<&str>, message: &str) {
    log::debug!(target: TARGET, "{}", format_entry(stage, context, message));
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a sink failure as a data problem or a communication problem.
///
/// PostgreSQL SQLSTATE class 22 (data exception) and 42 (syntax error or
/// access rule violation, e.g. undefined column) mean the rows did not fit
/// the destination. Class 08 and closed connections are communication.
pub fn classify_sink_failure(err: &SinkError) -> FailureType {
    match err {
        SinkError::Validation { .. } => FailureType::Validation,
        SinkError::Csv(_) => FailureType::Validation,
        SinkError::Io(_) => FailureType::Communication,
        SinkError::Database(db) => {
            if db.is_closed() {
                return FailureType::Communication;
            }
            match db.code().map(|c| c.code()) {
                Some(code) if code.starts_with("22") || code.starts_with("42") => {
                    FailureType::Validation
                }
                Some(code) if code.starts_with("08") => FailureType::Communication,
                Some(_) => FailureType::Unknown,
                // No SQLSTATE: the error came from the client side of the
                // connection rather than from the server.
                None => FailureType::Communication,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failed table publish with automatic classification.
pub fn log_sink_failure(table: &str, operation: &str, err: &SinkError) {
    let failure_type = classify_sink_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Validation => warn(Stage::Sink, Some(table), &message),
        FailureType::Communication | FailureType::Unknown => {
            error(Stage::Sink, Some(table), &message)
        }
    }
}

// ---------------------------------------------------------------------------
// Summary Logging
// ---------------------------------------------------------------------------

/// Log how many rows QAQC kept and why the rest were excluded.
pub fn log_qaqc_summary(stage: Stage, total: usize, clean: usize, flags: &[(String, usize)]) {
    let message = format!("QAQC complete: {}/{} rows clean", clean, total);
    if total > 0 && clean == 0 {
        warn(stage, None, &message);
    } else {
        info(stage, None, &message);
    }
    for (flag, count) in flags {
        debug(stage, None, &format!("  {}: {}", flag, count));
    }
}

/// Log the outcome of a replace-table publish.
pub fn log_publish_summary(table: &str, rows: usize) {
    let message = format!("Table replaced with {} rows", rows);
    if rows == 0 {
        warn(Stage::Sink, Some(table), &message);
    } else {
        info(Stage::Sink, Some(table), &message);
    }
}

/// Structured logging for the Hive sync and assessment service
///
/// Provides context-rich logging with source tags and record identifiers
/// (station ids, benchmark ids), timestamps, and severity levels. Supports
/// both console output and file-based logging for scheduled sync runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use crate::model::SourceError;
use crate::reconcile::SyncStats;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
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

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Log Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Hive,
    Csv,
    Store,
    Bench,
    System,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Hive => write!(f, "HIVE"),
            LogSource::Csv => write!(f, "CSV"),
            LogSource::Store => write!(f, "DB"),
            LogSource::Bench => write!(f, "BENCH"),
            LogSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. the warehouse is switched off and CSV mode is in use
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

fn logger_slot() -> MutexGuard<'static, Option<Logger>> {
    // A panic while holding the lock leaves the logger itself intact.
    LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        *logger_slot() = Some(logger);
    }

    fn log(&self, level: LogLevel, source: LogSource, key: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let entry = format_entry(level, source, key, message);
        let key_part = key.map(|k| format!(" [{}]", k)).unwrap_or_default();

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, key_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, key_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", source, key_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// Renders one log line: `<utc timestamp> <LEVEL> <SOURCE> [key]: message`.
pub fn format_entry(level: LogLevel, source: LogSource, key: Option<&str>, message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let key_part = key.map(|k| format!(" [{}]", k)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, source, key_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, source: LogSource, key: Option<&str>, message: &str) {
    if let Some(logger) = logger_slot().as_ref() {
        logger.log(level, source, key, message);
    }
}

/// Log a general informational message
pub fn info(source: LogSource, key: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, key, message);
}

/// Log a warning message
pub fn warn(source: LogSource, key: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, key, message);
}

/// Log an error message
pub fn error(source: LogSource, key: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, key, message);
}

/// Log a debug message
pub fn debug(source: LogSource, key: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, key, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an upstream source failure.
///
/// Timeouts are routine against a busy warehouse; connection and HTTP
/// failures point at the gateway or its configuration; malformed responses
/// suggest a gateway version mismatch.
pub fn classify_source_failure(err: &SourceError) -> FailureType {
    match err {
        SourceError::Timeout(_) => FailureType::Expected,
        SourceError::Connection(_) | SourceError::Http(_) | SourceError::Parse(_) => {
            FailureType::Unexpected
        }
        SourceError::Query(_) | SourceError::Io(_) => FailureType::Unknown,
    }
}

/// Log an upstream failure with automatic classification
pub fn log_source_failure(source: LogSource, key: &str, operation: &str, err: &SourceError) {
    let failure_type = classify_source_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(source, Some(key), &message),
        FailureType::Unexpected => error(source, Some(key), &message),
        FailureType::Unknown => warn(source, Some(key), &message),
    }
}

// ---------------------------------------------------------------------------
// Sync Summary Logging
// ---------------------------------------------------------------------------

/// Log the outcome of one reconciliation pass
pub fn log_sync_summary(source: LogSource, entity: &str, stats: &SyncStats) {
    let message = format!("{} sync complete: {}", entity, stats);

    if stats.errors == 0 {
        info(source, None, &message);
    } else if stats.created + stats.updated + stats.unchanged == 0 {
        error(source, None, &message);
    } else {
        warn(source, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!(" debug ".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_failure_classification() {
        let timeout = SourceError::Timeout("read timed out".to_string());
        assert_eq!(classify_source_failure(&timeout), FailureType::Expected);

        let http = SourceError::Http(502);
        assert_eq!(classify_source_failure(&http), FailureType::Unexpected);

        let rejected = SourceError::Query("Table not found: africa_obs".to_string());
        assert_eq!(classify_source_failure(&rejected), FailureType::Unknown);
    }

    #[test]
    fn test_entry_includes_source_and_key() {
        let entry = format_entry(LogLevel::Warning, LogSource::Csv, Some("XYZ-001"), "station not found");
        assert!(entry.contains("WARN CSV [XYZ-001]: station not found"), "got {}", entry);
        assert!(entry.contains("UTC"));
    }
}

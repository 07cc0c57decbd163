/// Structured logging for the case alert service
///
/// Provides context-rich logging with pipeline component and partition
/// identifiers, timestamps, and severity levels. Supports both console
/// output and file-based logging for scheduled runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

use crate::model::TrackerError;

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

impl FromStr for LogLevel {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(TrackerError::ConfigError(format!("unknown log level '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Upstream,
    Normalize,
    Store,
    Notify,
    Cycle,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Upstream => write!(f, "UPSTREAM"),
            Component::Normalize => write!(f, "NORM"),
            Component::Store => write!(f, "STORE"),
            Component::Notify => write!(f, "NOTIFY"),
            Component::Cycle => write!(f, "CYCLE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - rate limiting or a transient outage the next cycle will absorb
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

/// Classify a failure by what went wrong.
pub fn classify_failure(err: &TrackerError) -> FailureType {
    match err {
        // Rate limiting and gateway hiccups clear up by the next poll
        TrackerError::HttpError(429) | TrackerError::HttpError(502..=504) => FailureType::Expected,
        TrackerError::HttpError(_)
        | TrackerError::RequestFailed(_)
        | TrackerError::StoreError(_)
        | TrackerError::ConfigError(_) => FailureType::Unexpected,
        // Parse errors suggest an upstream schema change
        TrackerError::ParseError(_) => FailureType::Unexpected,
        // A region can legitimately vanish from the report, or be a config typo
        TrackerError::RegionNotFound(_) => FailureType::Unknown,
        TrackerError::NotificationFailed { .. } => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

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

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, component: Component, partition: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let partition_part = partition.map(|p| format!(" [{}]", p)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, component, partition_part, message)
    }

    /// Log a message with the global logger
    fn log(&self, level: LogLevel, component: Component, partition: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, component, partition, message);
        let partition_part = partition.map(|p| format!(" [{}]", p)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, partition_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, partition_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", component, partition_part, message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn log(level: LogLevel, component: Component, partition: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, partition, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, partition: Option<&str>, message: &str) {
    log(LogLevel::Info, component, partition, message);
}

/// Log a warning message
pub fn warn(component: Component, partition: Option<&str>, message: &str) {
    log(LogLevel::Warning, component, partition, message);
}

/// Log an error message
pub fn error(component: Component, partition: Option<&str>, message: &str) {
    log(LogLevel::Error, component, partition, message);
}

/// Log a debug message
pub fn debug(component: Component, partition: Option<&str>, message: &str) {
    log(LogLevel::Debug, component, partition, message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failure with automatic classification
pub fn log_failure(component: Component, partition: Option<&str>, operation: &str, err: &TrackerError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(component, partition, &message),
        FailureType::Unexpected => error(component, partition, &message),
        FailureType::Unknown => warn(component, partition, &message),
    }
}

// ---------------------------------------------------------------------------
// Cycle Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one poll cycle
pub fn log_cycle_summary(total: usize, successful: usize, failed: usize, alerts: usize) {
    let message = format!(
        "Cycle complete: {}/{} partitions processed, {} failed, {} alert(s) sent",
        successful, total, failed, alerts
    );

    if failed == 0 {
        info(Component::Cycle, None, &message);
    } else if successful == 0 {
        error(Component::Cycle, None, &message);
    } else {
        warn(Component::Cycle, None, &message);
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
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(classify_failure(&TrackerError::HttpError(503)), FailureType::Expected);
        assert_eq!(classify_failure(&TrackerError::HttpError(500)), FailureType::Unexpected);
        assert_eq!(
            classify_failure(&TrackerError::ParseError("eof".to_string())),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_failure(&TrackerError::RegionNotFound("ZZ".to_string())),
            FailureType::Unknown
        );
    }

    #[test]
    fn test_entry_carries_component_and_partition() {
        let entry = Logger::format_entry(LogLevel::Warning, Component::Store, Some("WA"), "slow");
        assert!(entry.ends_with("WARN STORE [WA]: slow"), "got {}", entry);
    }
}

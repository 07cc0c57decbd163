//! Service configuration.
//!
//! Loaded from a TOML file (default `./covid_alert.toml`), then overridden by
//! environment variables, with `.env` honoured through `dotenv`. The
//! environment variable names:
//!
//! | Variable        | Overrides             | Format            |
//! |-----------------|-----------------------|-------------------|
//! | `STATES`        | `regions`             | comma-separated   |
//! | `PHONE_NUMBERS` | `recipients`          | comma-separated   |
//! | `DATABASE_URL`  | `database_url`        | postgres URL      |
//! | `WEBHOOK_URL`   | `notify.webhook_url`  | URL               |
//!
//! A missing file is not an error; everything can come from the environment.

use std::path::Path;
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::cycle::CycleSettings;
use crate::ingest::covidtracking::DEFAULT_BASE_URL;
use crate::logging::LogLevel;
use crate::model::TrackerError;
use crate::normalize::Normalizer;

pub const DEFAULT_CONFIG_PATH: &str = "./covid_alert.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub base_url: String,
    /// Region codes to evaluate for alerts. All regions are stored regardless.
    pub regions: Vec<String>,
    /// Notification destinations, e.g. phone numbers for an SMS gateway.
    pub recipients: Vec<String>,
    /// Year assumed for upstream labels, which carry none.
    pub reference_year: i32,
    /// Offset of the upstream wall-clock labels from UTC, in minutes.
    /// Default -240 is US Eastern daylight time. The offset is fixed, so
    /// labels written under standard time (November to mid-March) decode
    /// one hour late; ordering between labels is unaffected.
    pub reference_utc_offset_minutes: i32,
    pub request_timeout_secs: u64,
    pub database_url: Option<String>,
    pub notify: NotifyConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// SMS gateway webhook. Alerts go to stdout when unset.
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            regions: Vec::new(),
            recipients: Vec::new(),
            reference_year: 2020,
            reference_utc_offset_minutes: -240,
            request_timeout_secs: 30,
            database_url: None,
            notify: NotifyConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Splits a comma-separated list, dropping blanks and repeats.
pub fn split_list(value: &str) -> Vec<String> {
    unique(value.split(',').map(str::trim).filter(|s| !s.is_empty()))
}

/// First occurrence of each item, in order.
fn unique<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}

impl TrackerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, TrackerError> {
        toml::from_str(contents).map_err(|e| TrackerError::ConfigError(e.to_string()))
    }

    /// Reads `path` if it exists, applies `.env` and process environment
    /// overrides, and validates the result.
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                TrackerError::ConfigError(format!("cannot read {}: {}", path.display(), e))
            })?;
            Self::from_toml_str(&contents)?
        } else {
            Self::default()
        };

        dotenv::dotenv().ok();
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(states) = lookup("STATES") {
            self.regions = split_list(&states);
        }
        if let Some(numbers) = lookup("PHONE_NUMBERS") {
            self.recipients = split_list(&numbers);
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(url) = lookup("WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        self.zone()?;
        self.log_level()?;
        if !(2000..=2100).contains(&self.reference_year) {
            return Err(TrackerError::ConfigError(format!(
                "reference_year {} is out of range",
                self.reference_year
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(TrackerError::ConfigError(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn zone(&self) -> Result<FixedOffset, TrackerError> {
        self.reference_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                TrackerError::ConfigError(format!(
                    "reference_utc_offset_minutes {} is not a valid UTC offset",
                    self.reference_utc_offset_minutes
                ))
            })
    }

    pub fn log_level(&self) -> Result<LogLevel, TrackerError> {
        self.log.level.parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn normalizer(&self) -> Result<Normalizer, TrackerError> {
        Ok(Normalizer::new(self.reference_year, self.zone()?))
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            regions: unique(self.regions.iter().map(String::as_str)),
            recipients: unique(self.recipients.iter().map(String::as_str)),
        }
    }

    pub fn require_database_url(&self) -> Result<&str, TrackerError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| TrackerError::ConfigError("DATABASE_URL must be set".to_string()))
    }
}

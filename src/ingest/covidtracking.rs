/// COVID Tracking Project API client
///
/// Retrieves current and daily case reports for the US aggregate, for every
/// state/territory, and for counties. Responses are JSON arrays of loosely
/// typed objects; they are returned as `RawRecord`s and normalized elsewhere.
///
/// API base: https://covidtracking.com/api

use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::model::{RawRecord, TrackerError};

pub const DEFAULT_BASE_URL: &str = "https://covidtracking.com";

// ============================================================================
// Endpoints
// ============================================================================

/// The fixed set of upstream reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    StatesCurrent,
    StatesDaily,
    StatesInfo,
    UsCurrent,
    UsDaily,
    Counties,
    TrackerUrls,
}

impl Endpoint {
    pub const ALL: [Endpoint; 7] = [
        Endpoint::StatesCurrent,
        Endpoint::StatesDaily,
        Endpoint::StatesInfo,
        Endpoint::UsCurrent,
        Endpoint::UsDaily,
        Endpoint::Counties,
        Endpoint::TrackerUrls,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::StatesCurrent => "states_current",
            Endpoint::StatesDaily => "states_daily",
            Endpoint::StatesInfo => "states_info",
            Endpoint::UsCurrent => "us_current",
            Endpoint::UsDaily => "us_daily",
            Endpoint::Counties => "counties",
            Endpoint::TrackerUrls => "tracker_urls",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::StatesCurrent => "/api/states",
            Endpoint::StatesDaily => "/api/states/daily",
            Endpoint::StatesInfo => "/api/states/info",
            Endpoint::UsCurrent => "/api/us",
            Endpoint::UsDaily => "/api/us/daily",
            Endpoint::Counties => "/api/counties",
            Endpoint::TrackerUrls => "/api/urls",
        }
    }

    /// `tracker_urls` is an opaque listing, not a record set.
    pub fn returns_records(&self) -> bool {
        !matches!(self, Endpoint::TrackerUrls)
    }

    /// Comma-separated list of endpoint names, for help and error text.
    pub fn names() -> String {
        Endpoint::ALL
            .iter()
            .map(Endpoint::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| {
                TrackerError::ConfigError(format!(
                    "Need valid report type (one of: {})",
                    Endpoint::names()
                ))
            })
    }
}

/// Joins a base URL and an endpoint path without doubling the slash.
pub fn build_url(base_url: &str, endpoint: Endpoint) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), endpoint.path())
}

// ============================================================================
// Fetch capability
// ============================================================================

/// Anything that can produce upstream reports. Implemented by the HTTP
/// client and by in-memory fakes in tests.
pub trait UpstreamSource {
    /// Returns the response body verbatim.
    fn fetch_text(&self, endpoint: Endpoint) -> Result<String, TrackerError>;

    /// Returns the response parsed as a list of raw records.
    fn fetch_records(&self, endpoint: Endpoint) -> Result<Vec<RawRecord>, TrackerError> {
        parse_records(&self.fetch_text(endpoint)?)
    }
}

/// Parses a response body into raw records.
///
/// Accepts a JSON array of objects or a single object; anything else is a
/// `ParseError`.
pub fn parse_records(body: &str) -> Result<Vec<RawRecord>, TrackerError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| TrackerError::ParseError(e.to_string()))?;

    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(TrackerError::ParseError(format!(
                    "element {} is not an object: {}",
                    i, other
                ))),
            })
            .collect(),
        Value::Object(map) => Ok(vec![map]),
        other => Err(TrackerError::ParseError(format!(
            "expected an array of objects, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// Blocking HTTP client for the upstream API.
pub struct CovidTrackingClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl CovidTrackingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TrackerError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }
}

impl UpstreamSource for CovidTrackingClient {
    fn fetch_text(&self, endpoint: Endpoint) -> Result<String, TrackerError> {
        let url = build_url(&self.base_url, endpoint);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| TrackerError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TrackerError::HttpError(response.status().as_u16()));
        }

        response
            .text()
            .map_err(|e| TrackerError::RequestFailed(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

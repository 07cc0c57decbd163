//! Alert delivery.
//!
//! One message, one delivery per recipient; a recipient listed twice is
//! sent to once. Deliveries are independent: a failed recipient is recorded
//! and the loop moves on.

use std::time::Duration;

use serde::Serialize;

use crate::alert::detector::AlertDecision;
use crate::logging::{self, Component};
use crate::model::TrackerError;

/// Outbound notification capability (SMS gateway, webhook, console...).
pub trait Notifier {
    fn send(&self, recipient: &str, message: &str) -> Result<(), TrackerError>;
}

/// Result of one dispatch call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSummary {
    pub message: Option<String>,
    pub delivered: Vec<String>,
    pub failures: Vec<TrackerError>,
}

impl DispatchSummary {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sends the alert for `decision` to every recipient.
///
/// `NoAlert` does nothing and returns an empty summary.
pub fn dispatch(
    decision: &AlertDecision,
    location_label: &str,
    recipients: &[String],
    notifier: &dyn Notifier,
) -> DispatchSummary {
    let Some(message) = decision.message(location_label) else {
        return DispatchSummary::default();
    };

    logging::info(Component::Notify, Some(location_label), &message.replace('\n', " "));

    let mut summary = DispatchSummary {
        message: Some(message.clone()),
        ..DispatchSummary::default()
    };

    let mut seen: Vec<&str> = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        if seen.contains(&recipient.as_str()) {
            continue;
        }
        seen.push(recipient.as_str());

        match notifier.send(recipient, &message) {
            Ok(()) => summary.delivered.push(recipient.clone()),
            Err(e) => {
                logging::log_failure(Component::Notify, Some(location_label), "send alert", &e);
                summary.failures.push(e);
            }
        }
    }

    summary
}

// ---------------------------------------------------------------------------
// Notifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    message: &'a str,
}

/// Posts `{"to": ..., "message": ...}` to an SMS gateway webhook.
pub struct WebhookNotifier {
    http: reqwest::blocking::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TrackerError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, recipient: &str, message: &str) -> Result<(), TrackerError> {
        let failed = |reason: String| TrackerError::NotificationFailed {
            recipient: recipient.to_string(),
            reason,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&WebhookPayload { to: recipient, message })
            .send()
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}

/// Prints alerts to stdout. Used when no webhook is configured.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, recipient: &str, message: &str) -> Result<(), TrackerError> {
        println!("[to {}] {}", recipient, message);
        Ok(())
    }
}

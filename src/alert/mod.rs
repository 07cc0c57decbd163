//! Case-increase alerting.
//!
//! Submodules:
//! - `detector`: decides whether a new snapshot is an increase over the old one.
//! - `dispatch`: renders alert text and delivers it to each recipient.

pub mod detector;
pub mod dispatch;

pub use detector::{detect_increase, AlertDecision};
pub use dispatch::{dispatch, ConsoleNotifier, DispatchSummary, Notifier, WebhookNotifier};

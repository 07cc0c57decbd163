//! Polls the COVID Tracking Project API, keeps a snapshot history per
//! partition (the national aggregate and each region), and notifies a list
//! of recipients when a monitored partition's positive case count rises
//! between polls.

pub mod alert;
pub mod config;
pub mod cycle;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod regions;
pub mod report;
pub mod store;

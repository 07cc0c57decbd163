/// Upstream data retrieval.
///
/// Submodules:
/// - `covidtracking`: endpoint catalogue, fetch capability and HTTP client.

pub mod covidtracking;

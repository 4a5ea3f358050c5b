use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("healthy")
    pub status: String,
    /// Crate version
    pub version: String,
    /// Number of CIDR ranges in the active whitelist
    pub whitelist_ranges: usize,
    /// Whether forwarding headers are trusted
    pub use_header: bool,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

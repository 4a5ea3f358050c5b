//! Health endpoint.
//!
//! `GET /health` sits behind the whitelist like every other route, so probes
//! must originate from an allowed range.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::middleware::IpWhitelistLayer;
use crate::models::HealthResponse;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "whitelist_ranges": 2,
///   "use_header": false,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(layer))]
pub async fn health_check(State(layer): State<IpWhitelistLayer>) -> Json<HealthResponse> {
    let whitelister = layer.whitelister();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        whitelist_ranges: whitelister.whitelist().ranges().len(),
        use_header: whitelister.use_header(),
        timestamp: Utc::now(),
    })
}

//! Stand-in for the protected upstream.
//!
//! Routing to real backends is out of scope for this service; any request
//! that clears the whitelist is answered here.

use axum::http::{Method, StatusCode, Uri};
use tracing::{debug, instrument};

/// Fallback handler for every non-health path.
#[instrument]
pub async fn passthrough(method: Method, uri: Uri) -> (StatusCode, &'static str) {
    debug!(%method, path = %uri.path(), "Request reached upstream");
    (StatusCode::OK, "OK")
}

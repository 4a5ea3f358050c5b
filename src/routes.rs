//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging (sees denials too)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   IP Whitelist   │ ← 403 if client IP is not whitelisted
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `GET /health` - Health check
//! - everything else - upstream stand-in, answers `200 OK`
//!
//! Every route is behind the whitelist.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::WhitelistError;
use crate::handlers;
use crate::metrics;
use crate::middleware::IpWhitelistLayer;

/// Build the application router with the whitelist gate installed.
///
/// The transport address is read from `ConnectInfo`, so the router must be
/// served with `into_make_service_with_connect_info::<SocketAddr>()`.
/// Without it every request is denied when header trust is off.
///
/// # Errors
///
/// Returns [`WhitelistError`] if `config.ip_whitelist` is empty or contains
/// an invalid CIDR range. No router is produced in that case.
pub fn build_router(config: &Config) -> Result<Router, WhitelistError> {
    let layer = IpWhitelistLayer::new(&config.ip_whitelist, config.whitelist_use_header)?;
    Ok(build_router_with_layer(layer))
}

/// Build the router around an already-constructed whitelist layer.
pub fn build_router_with_layer(layer: IpWhitelistLayer) -> Router {
    let whitelister = layer.whitelister();
    let ranges = whitelister.whitelist().ranges();

    info!(
        ranges = ranges.len(),
        use_header = whitelister.use_header(),
        "IP whitelist enabled"
    );
    for range in ranges {
        info!(cidr = %range, "Whitelisted range");
    }
    if whitelister.use_header() {
        info!("Client IP taken from X-Forwarded-For / X-Real-Ip when present");
    }
    metrics::set_whitelist_ranges(ranges.len());

    Router::new()
        .route("/health", get(handlers::health_check))
        .fallback(handlers::passthrough)
        .with_state(layer.clone())
        .layer(layer)
        .layer(TraceLayer::new_for_http())
}

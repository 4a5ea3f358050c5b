//! # IP Whitelist
//!
//! CIDR-based access control for Axum/Tower HTTP pipelines. Each request is
//! judged by its client IP address and either passed through unchanged or
//! rejected with `403 Forbidden`.
//!
//! - **Whitelist**: IPv4 and IPv6 CIDR ranges, validated once at start-up
//! - **Client resolution**: transport address, or the last `X-Forwarded-For`
//!   hop / `X-Real-Ip` when header trust is enabled
//! - **Fail-closed**: anything that is not a parseable, whitelisted address is
//!   denied
//! - **Observability**: structured logging and Prometheus counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TraceLayer                                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IpWhitelistLayer ── ClientAddressSource → IpWhitelister    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, upstream passthrough)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use axum::{Router, routing::get};
//! use ip_whitelist::IpWhitelistLayer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let layer = IpWhitelistLayer::new(&["10.0.0.0/8", "fe80::/16"], false)?;
//!     let app = Router::new().route("/", get(|| async { "hello" })).layer(layer);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! IP_WHITELIST=10.0.0.0/8,fe80::/16 IP_WHITELIST_USE_HEADER=true cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod utils;
pub mod whitelist;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult, WhitelistError};
pub use middleware::{IpWhitelistLayer, IpWhitelister};
pub use routes::build_router;
pub use whitelist::{CidrRange, IpWhitelist};

//! HTTP middleware for CIDR-based access control.
//!
//! - **Client address resolution** (`ip`): picks the address a request is
//!   judged by, from the transport peer or (optionally) forwarding headers
//! - **IP whitelist** (`whitelist`): Tower layer that forwards whitelisted
//!   requests and answers everything else with 403
//!
//! # Architecture
//!
//! ```text
//! Request → resolve client IP → whitelist lookup ─┬─ member ──► inner service → Response
//!                                                 └─ otherwise ► 403 Forbidden
//! ```
//!
//! # Security Considerations
//!
//! - Header trust is opt-in; without it forwarding headers are ignored
//! - Only the last X-Forwarded-For hop is considered
//! - Anything that cannot be parsed as an IP is denied

pub mod ip;
pub mod whitelist;

pub use ip::{
    AddressOrigin, ClientAddressSource, ExtractedIp, X_FORWARDED_FOR, X_REAL_IP,
    extract_candidate, parse_candidate, split_host_port,
};
pub use whitelist::{
    AccessDecision, FORBIDDEN_BODY, IpWhitelistLayer, IpWhitelistService, IpWhitelister,
};

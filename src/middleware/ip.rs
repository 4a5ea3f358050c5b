//! Client address resolution for the whitelist middleware.
//!
//! Determines which address a request should be judged by. There are three
//! possible inputs:
//!
//! - the transport peer address (`ConnectInfo<SocketAddr>`), always available
//!   when the server is started with `into_make_service_with_connect_info`
//! - the `X-Forwarded-For` header
//! - the `X-Real-Ip` header
//!
//! # Security Warning: IP Spoofing Risk
//!
//! Forwarding headers are supplied by whoever sent the request. They are only
//! consulted when header trust is switched on, which should only be done when
//! this service sits behind a reverse proxy that sets them.
//!
//! Even then only the **last** `X-Forwarded-For` entry is used. That entry was
//! appended by the nearest proxy; everything before it came from upstream hops
//! or straight from the client and proves nothing:
//!
//! ```text
//! X-Forwarded-For: 6.6.6.6, 203.0.113.50
//!                  ^^^^^^^  ^^^^^^^^^^^^
//!                  spoofed  added by our proxy (used)
//! ```
//!
//! # Resolution Order
//!
//! ```text
//!               use_header?
//!             ┌─────┴─────┐
//!            no          yes
//!             │           │
//!             │    X-Forwarded-For non-blank? ── yes ──► last token
//!             │           │ no
//!             │    X-Real-Ip non-blank? ──────── yes ──► trimmed value
//!             │           │ no
//!             ▼           ▼
//!          transport address, port stripped
//! ```
//!
//! Nothing here validates the candidate. Parsing happens in
//! [`parse_candidate`], and any failure there is treated as a denial by the
//! caller.

use std::borrow::Cow;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::debug;

/// Header name for the proxy chain.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Header name for the single-address proxy header.
pub const X_REAL_IP: &str = "x-real-ip";

/// Which request input a candidate address was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressOrigin {
    /// Transport peer address
    RemoteAddr,
    /// Last entry of `X-Forwarded-For`
    XForwardedFor,
    /// `X-Real-Ip`
    XRealIp,
    /// No usable input at all
    Missing,
}

impl AddressOrigin {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressOrigin::RemoteAddr => "remote_addr",
            AddressOrigin::XForwardedFor => "x_forwarded_for",
            AddressOrigin::XRealIp => "x_real_ip",
            AddressOrigin::Missing => "missing",
        }
    }
}

impl fmt::Display for AddressOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate client address selected for a request.
///
/// Borrowed from the [`ClientAddressSource`] it was extracted from, so
/// extraction never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractedIp<'a> {
    /// IP taken from the transport address, port removed.
    FromRemoteAddr(&'a str),
    /// IP taken from X-Forwarded-For (last entry in the list).
    FromXff(&'a str),
    /// IP taken from X-Real-Ip.
    FromRealIp(&'a str),
    /// No transport address and no trusted header; never authorized.
    NotFound,
}

impl<'a> ExtractedIp<'a> {
    /// The raw candidate string (empty for [`ExtractedIp::NotFound`]).
    pub fn as_str(&self) -> &'a str {
        match *self {
            ExtractedIp::FromRemoteAddr(ip)
            | ExtractedIp::FromXff(ip)
            | ExtractedIp::FromRealIp(ip) => ip,
            ExtractedIp::NotFound => "",
        }
    }

    /// Where the candidate came from.
    pub fn origin(&self) -> AddressOrigin {
        match self {
            ExtractedIp::FromRemoteAddr(_) => AddressOrigin::RemoteAddr,
            ExtractedIp::FromXff(_) => AddressOrigin::XForwardedFor,
            ExtractedIp::FromRealIp(_) => AddressOrigin::XRealIp,
            ExtractedIp::NotFound => AddressOrigin::Missing,
        }
    }
}

/// The request inputs that can identify a client.
///
/// Decoupled from any HTTP type so the decision logic can be driven from
/// plain strings. [`ClientAddressSource::from_request`] fills it in from an
/// Axum request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientAddressSource<'a> {
    /// Transport address in `host:port` form
    pub remote_addr: Option<Cow<'a, str>>,
    /// Raw `X-Forwarded-For` value
    pub x_forwarded_for: Option<Cow<'a, str>>,
    /// Raw `X-Real-Ip` value
    pub x_real_ip: Option<Cow<'a, str>>,
}

impl<'a> ClientAddressSource<'a> {
    /// An empty source: no transport address, no headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transport address (`host:port`).
    pub fn with_remote_addr(mut self, addr: impl Into<Cow<'a, str>>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set the `X-Forwarded-For` value.
    pub fn with_forwarded_for(mut self, value: impl Into<Cow<'a, str>>) -> Self {
        self.x_forwarded_for = Some(value.into());
        self
    }

    /// Set the `X-Real-Ip` value.
    pub fn with_real_ip(mut self, value: impl Into<Cow<'a, str>>) -> Self {
        self.x_real_ip = Some(value.into());
        self
    }

    /// Collect the client address inputs of an Axum request.
    ///
    /// The transport address comes from the `ConnectInfo<SocketAddr>`
    /// extension. Header values that are not valid UTF-8 are decoded lossily;
    /// the replacement characters make the candidate unparseable, which denies
    /// the request. Repeated `X-Forwarded-For` lines are combined into one
    /// list, so a blank last line still yields an empty last token. For a
    /// repeated `X-Real-Ip` the last occurrence is used.
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Cow::Owned(addr.to_string()));

        Self {
            remote_addr,
            x_forwarded_for: combined_header_value(req, X_FORWARDED_FOR),
            x_real_ip: last_header_value(req, X_REAL_IP),
        }
    }
}

#[inline]
fn last_header_value<'a, B>(req: &'a Request<B>, name: &str) -> Option<Cow<'a, str>> {
    req.headers()
        .get_all(name)
        .iter()
        .last()
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
}

/// Join every line of a list-valued header with `", "`.
///
/// The header only counts as absent (or blank) when every line is blank.
fn combined_header_value<'a, B>(req: &'a Request<B>, name: &str) -> Option<Cow<'a, str>> {
    let mut lines: Vec<Cow<'a, str>> = req
        .headers()
        .get_all(name)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
        .collect();

    if lines.len() <= 1 || lines.iter().all(|line| line.trim().is_empty()) {
        return lines.pop();
    }

    Some(Cow::Owned(lines.join(", ")))
}

/// Select the candidate client address.
///
/// With `use_header` off, forwarding headers are ignored entirely. See the
/// module documentation for the full resolution order.
#[inline]
pub fn extract_candidate<'a>(source: &'a ClientAddressSource<'_>, use_header: bool) -> ExtractedIp<'a> {
    if use_header {
        // Format: "client, proxy1, proxy2" - only the last hop is ours
        if let Some(forwarded) = source.x_forwarded_for.as_deref()
            && !forwarded.trim().is_empty()
            && let Some(last_ip) = forwarded.rsplit(',').next()
        {
            return ExtractedIp::FromXff(last_ip.trim());
        }

        if let Some(real_ip) = source.x_real_ip.as_deref()
            && !real_ip.trim().is_empty()
        {
            return ExtractedIp::FromRealIp(real_ip.trim());
        }
    }

    match source.remote_addr.as_deref() {
        Some(addr) => match split_host_port(addr) {
            Some(host) => ExtractedIp::FromRemoteAddr(host),
            None => {
                debug!(remote_addr = %addr, "Transport address is not in host:port form");
                ExtractedIp::NotFound
            }
        },
        None => ExtractedIp::NotFound,
    }
}

/// Strip the port from a `host:port` or `[host]:port` transport address.
///
/// Returns `None` when there is no port separator, or when an IPv6 host is
/// not bracketed (`::1:80` is ambiguous).
pub fn split_host_port(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, _port) = rest.split_once("]:")?;
        return Some(host);
    }

    let (host, _port) = addr.rsplit_once(':')?;
    if host.contains(':') {
        return None;
    }
    Some(host)
}

/// Parse a candidate address, unwrapping a bracketed IPv6 literal.
///
/// Returns `None` for anything that is not a plain IPv4 or IPv6 address,
/// including values that still carry a port. Brackets are only accepted
/// around IPv6: `[1.2.3.4]` does not parse.
pub fn parse_candidate(candidate: &str) -> Option<IpAddr> {
    if let Some(inner) = candidate.strip_prefix('[').and_then(|c| c.strip_suffix(']')) {
        return inner.parse::<Ipv6Addr>().ok().map(IpAddr::V6);
    }

    candidate.parse().ok()
}

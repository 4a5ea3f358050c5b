//! CIDR whitelist parsing and membership testing.
//!
//! A whitelist is built once from a list of CIDR strings and never changes
//! afterwards, so it can be shared across request tasks behind an `Arc`
//! without any locking.
//!
//! # Accepted Syntax
//!
//! Each entry must be `<address>/<prefix>`:
//!
//! - `1.2.3.4/24`, `8.8.8.8/32`, `0.0.0.0/0`
//! - `fe80::/16`, `2a03:4000:6:d080::42/128`
//!
//! Bare addresses (no prefix), bracketed or zoned IPv6 literals, and prefixes
//! longer than the address family allows are rejected. Surrounding whitespace
//! is ignored.
//!
//! # Matching
//!
//! Ranges are tested in their own family only. An IPv4 candidate never matches
//! an IPv6 range and vice versa, including IPv4-mapped IPv6 addresses such as
//! `::ffff:1.2.3.4`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::info;

use crate::error::WhitelistError;

const IPV4_MAX_PREFIX: u8 = 32;
const IPV6_MAX_PREFIX: u8 = 128;

// =============================================================================
// CIDR Range
// =============================================================================

/// A single parsed network range.
///
/// The stored network address is already masked, so `1.2.3.4/24` is held as
/// `1.2.3.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrRange {
    /// Network address with host bits cleared
    network: IpAddr,
    /// Prefix length (e.g., 24 for /24)
    prefix_len: u8,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "::1/128").
    ///
    /// Returns `None` if the format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let (addr, prefix) = cidr.trim().split_once('/')?;

        // `u8::from_str` accepts a leading '+', which is not CIDR syntax
        if prefix.is_empty() || prefix.len() > 3 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let ip: IpAddr = addr.parse().ok()?;
        let prefix_len: u8 = prefix.parse().ok()?;

        if prefix_len > max_prefix(&ip) {
            return None;
        }

        Some(Self {
            network: mask_address(ip, prefix_len),
            prefix_len,
        })
    }

    /// Network address of the range.
    pub fn network(&self) -> IpAddr {
        self.network
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Netmask in the range's address family (e.g. `255.255.255.0`, `ffff::`).
    pub fn mask(&self) -> IpAddr {
        match self.network {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(v4_mask(self.prefix_len))),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(v6_mask(self.prefix_len))),
        }
    }

    /// Check if an IP address is contained within this CIDR range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                u32::from(*addr) & v4_mask(self.prefix_len) == u32::from(*net)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                u128::from(*addr) & v6_mask(self.prefix_len) == u128::from(*net)
            }
            // IPv4 and IPv6 don't match
            _ => false,
        }
    }
}

impl fmt::Display for CidrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

fn max_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => IPV4_MAX_PREFIX,
        IpAddr::V6(_) => IPV6_MAX_PREFIX,
    }
}

fn v4_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (IPV4_MAX_PREFIX - prefix_len)
    }
}

fn v6_mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (IPV6_MAX_PREFIX - prefix_len)
    }
}

fn mask_address(ip: IpAddr, prefix_len: u8) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => IpAddr::V4(Ipv4Addr::from(u32::from(addr) & v4_mask(prefix_len))),
        IpAddr::V6(addr) => IpAddr::V6(Ipv6Addr::from(u128::from(addr) & v6_mask(prefix_len))),
    }
}

// =============================================================================
// Whitelist
// =============================================================================

/// An immutable, non-empty set of allowed network ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpWhitelist {
    /// Ranges in the order they were configured
    ranges: Vec<CidrRange>,
}

impl IpWhitelist {
    /// Build a whitelist from CIDR strings.
    ///
    /// Construction is all-or-nothing: the first entry that fails to parse
    /// aborts it and no whitelist is produced.
    ///
    /// # Errors
    ///
    /// - [`WhitelistError::Empty`] if `cidrs` is empty or every entry is blank.
    /// - [`WhitelistError::InvalidCidr`] for the first entry that is not valid
    ///   CIDR notation. A blank entry next to real ones counts as invalid.
    pub fn new<S: AsRef<str>>(cidrs: &[S]) -> Result<Self, WhitelistError> {
        if cidrs.iter().all(|cidr| cidr.as_ref().trim().is_empty()) {
            return Err(WhitelistError::Empty);
        }

        let ranges = cidrs
            .iter()
            .map(|cidr| {
                let cidr = cidr.as_ref();
                CidrRange::parse(cidr).ok_or_else(|| WhitelistError::InvalidCidr {
                    entry: cidr.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = ranges.len(), "IP whitelist loaded with {} CIDR ranges", ranges.len());

        Ok(Self { ranges })
    }

    /// Check whether `ip` falls inside any configured range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.ranges.iter().any(|range| range.contains(ip))
    }

    /// The parsed ranges, in configuration order.
    pub fn ranges(&self) -> &[CidrRange] {
        &self.ranges
    }
}

//! Fuzz testing for whitelist parsing and client address resolution.
//!
//! Ensures that arbitrary configuration strings and request inputs:
//!
//! - Never panic while parsing CIDR ranges or candidate addresses
//! - Never allow a request whose candidate is not a parseable address
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_whitelist -- -max_total_time=60
//! ```

#![no_main]

use ip_whitelist::middleware::{ClientAddressSource, parse_candidate, split_host_port};
use ip_whitelist::{CidrRange, IpWhitelist, IpWhitelister};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // Config side: a single range and a comma-separated list
    let _ = CidrRange::parse(s);
    let entries: Vec<&str> = s.split(',').collect();
    let _ = IpWhitelist::new(&entries);

    // Request side
    let _ = split_host_port(s);
    let _ = parse_candidate(s);

    let Ok(whitelister) = IpWhitelister::new(&["0.0.0.0/0", "::/0"], true) else {
        return;
    };

    let source = ClientAddressSource::new()
        .with_remote_addr(s)
        .with_forwarded_for(s)
        .with_real_ip(s);
    let decision = whitelister.decide(&source);

    if decision.is_allowed() {
        assert!(parse_candidate(decision.candidate().as_str()).is_some());
    }
});

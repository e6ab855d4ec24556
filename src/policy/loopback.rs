//! Loopback host policy.
//!
//! A host is allowed only when it names the local machine: one of a fixed set
//! of loopback hostnames, or an IP literal in `127.0.0.0/8` or `::1`.

use std::net::IpAddr;

/// Hostnames that resolve to loopback on conventional systems.
static LOOPBACK_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
];

/// True iff `address` parses as an IP literal in the loopback range.
///
/// Anything that fails to parse is simply not loopback.
pub fn is_loopback_address(address: &str) -> bool {
    match address.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback(),
        Err(_) => false,
    }
}

/// True iff `host` is a loopback hostname or loopback IP literal.
///
/// Surrounding brackets (`[::1]`) are ignored and hostname comparison is
/// case-insensitive.
pub fn is_allowed_host(host: &str) -> bool {
    let host = strip_brackets(host.trim());
    let lower = host.to_ascii_lowercase();

    if LOOPBACK_HOSTNAMES.contains(&lower.as_str()) {
        return true;
    }

    is_loopback_address(host)
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

//! Argument-shape classification.
//!
//! Each command-line token is matched against a fixed, ordered list of
//! network shapes: URL, IPv4 literal, IPv6 literal, `host:port`. The first
//! shape that matches decides the classification; later shapes are never
//! consulted for that token, even when they would also match.

use regex::Regex;
use std::net::Ipv6Addr;
use std::sync::OnceLock;
use url::{Host, Url};

/// Network shape recognised in a token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressKind {
    Url,
    Ipv4,
    Ipv6,
    HostPort,
    NotNetwork,
}

impl AddressKind {
    /// Category label used in denial reasons
    pub fn label(self) -> &'static str {
        match self {
            AddressKind::Url => "URL",
            AddressKind::Ipv4 => "IPv4 address",
            AddressKind::Ipv6 => "IPv6 address",
            AddressKind::HostPort => "Host:port",
            AddressKind::NotNetwork => "Argument",
        }
    }
}

/// Classification of a single token and the host extracted from it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub kind: AddressKind,
    pub host: Option<String>,
}

impl Classification {
    pub fn not_network() -> Self {
        Self {
            kind: AddressKind::NotNetwork,
            host: None,
        }
    }

    fn network(kind: AddressKind, host: Option<String>) -> Self {
        Self { kind, host }
    }

    pub fn is_network(&self) -> bool {
        self.kind != AddressKind::NotNetwork
    }
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:https?|ftps?)://").expect("url pattern"))
}

fn ipv4_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[^@\s/]+@)?(\d{1,3}(?:\.\d{1,3}){3})(?::\d+)?(?:/\S*)?$")
            .expect("ipv4 pattern")
    })
}

fn bracketed_ipv6_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[^@\s/]+@)?(\[[0-9A-Fa-f.]*:[0-9A-Fa-f:.]*\])(?::\d+)?(?:/\S*)?$")
            .expect("bracketed ipv6 pattern")
    })
}

fn bare_ipv6_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9A-Fa-f]*(?::[0-9A-Fa-f]*){2,}$").expect("bare ipv6 pattern")
    })
}

fn host_port_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[^@\s/]+@)?([A-Za-z0-9.-]+):(\d+)(?:/\S*)?$").expect("host:port pattern")
    })
}

// `user:secret@host` with no scheme and no port; emails carry no `:` before `@`.
fn credentials_host_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s/]*:[^@\s/]*@([A-Za-z0-9.-]+)(?::\d+)?(?:/\S*)?$")
            .expect("credentials host pattern")
    })
}

/// Classify one argument token.
///
/// Every shape must cover the whole value: a URL or address buried inside a
/// longer token does not speak for the token. Flag tokens (leading `-`) are
/// only inspected after their first `=`; bare flags without a value are never
/// network-shaped.
pub fn classify(token: &str) -> Classification {
    match network_candidate(token) {
        Some(value) => classify_value(value),
        None => Classification::not_network(),
    }
}

fn network_candidate(token: &str) -> Option<&str> {
    if token.starts_with('-') {
        return token.split_once('=').map(|(_, value)| value);
    }
    Some(token)
}

fn classify_value(value: &str) -> Classification {
    if url_pattern().is_match(value) {
        return Classification::network(AddressKind::Url, extract_host_from_url(value));
    }

    if let Some(caps) = ipv4_pattern().captures(value) {
        return Classification::network(AddressKind::Ipv4, Some(caps[1].to_string()));
    }

    if let Some(caps) = bracketed_ipv6_pattern().captures(value) {
        let host = extract_host_from_address(&caps[1]);
        if host.parse::<Ipv6Addr>().is_ok() {
            return Classification::network(AddressKind::Ipv6, Some(host));
        }
        return Classification::not_network();
    }
    if bare_ipv6_pattern().is_match(value) && looks_like_bare_ipv6(value) {
        return Classification::network(AddressKind::Ipv6, Some(extract_host_from_address(value)));
    }

    if let Some(caps) = host_port_pattern()
        .captures(value)
        .or_else(|| credentials_host_pattern().captures(value))
    {
        return Classification::network(AddressKind::HostPort, Some(caps[1].to_string()));
    }

    Classification::not_network()
}

// Slices (`1:2:3`) and paths (`cafe::add`) share the hex-and-colon alphabet.
// An address must parse, possibly after dropping a `:port`, and carry a digit.
fn looks_like_bare_ipv6(value: &str) -> bool {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return false;
    }
    value.parse::<Ipv6Addr>().is_ok() || extract_host_from_address(value).parse::<Ipv6Addr>().is_ok()
}

/// Hostname of a URL's authority, brackets stripped for IPv6.
///
/// Returns `None` when the string does not parse as a URL or has no host.
pub fn extract_host_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    match parsed.host()? {
        Host::Domain(domain) if domain.is_empty() => None,
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// Host part of an address such as `host:port`, `[v6]:port` or `[v6]`.
///
/// For unbracketed addresses with several colons the trailing segment is
/// treated as a port only when it is all digits and the whole string is not
/// already a valid IPv6 address.
pub fn extract_host_from_address(address: &str) -> String {
    let address = address.trim();

    if let Some(rest) = address.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => rest[..end].to_string(),
            None => rest.to_string(),
        };
    }

    match address.matches(':').count() {
        0 => address.to_string(),
        1 => address
            .split_once(':')
            .map(|(host, _)| host)
            .unwrap_or(address)
            .to_string(),
        _ => {
            if address.parse::<Ipv6Addr>().is_ok() {
                return address.to_string();
            }
            match address.rsplit_once(':') {
                Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                    head.to_string()
                }
                _ => address.to_string(),
            }
        }
    }
}

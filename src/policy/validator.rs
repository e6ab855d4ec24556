//! Invocation-level network validation.
//!
//! Pure and I/O free: runs before anything is spawned.

use crate::config::types::{Invocation, ValidationResult};
use crate::policy::classifier::{classify, Classification};
use crate::policy::loopback::is_allowed_host;

/// Gate applied to a whole invocation
pub struct InvocationValidator;

impl InvocationValidator {
    /// Validate command name and arguments of an invocation
    pub fn validate(invocation: &Invocation) -> ValidationResult {
        validate_network_args(&invocation.argv())
    }
}

/// Check every token left to right, stopping at the first non-loopback host.
pub fn validate_network_args<S: AsRef<str>>(args: &[S]) -> ValidationResult {
    for token in args {
        let token = token.as_ref();
        let classification = classify(token);
        if !classification.is_network() {
            continue;
        }

        let allowed = classification
            .host
            .as_deref()
            .map(is_allowed_host)
            .unwrap_or(false);

        if !allowed {
            let reason = denial_reason(&classification, token);
            log::debug!("network validation denied: {}", reason);
            return ValidationResult::deny(reason);
        }
    }

    ValidationResult::allow()
}

fn denial_reason(classification: &Classification, token: &str) -> String {
    let category = classification.kind.label();
    match classification.host.as_deref() {
        Some(host) => format!("{} targets non-loopback host '{}': {}", category, host, token),
        None => format!(
            "{} has no parseable host and is treated as non-loopback: {}",
            category, token
        ),
    }
}

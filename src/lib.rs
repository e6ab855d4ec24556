//! autoapprove: run a command only when its arguments stay on loopback
//! Every approved invocation leaves an on-disk audit record of what ran and how it ended.
//!
//! # Architecture
//!
//! ## Network Policy ([`policy`])
//! - [`policy::classifier`]: Token shapes (URL, IPv4, IPv6, host:port) and host extraction
//! - [`policy::loopback`]: Loopback address predicate and hostname allowlist
//! - [`policy::validator`]: Argument-vector gate, first denial wins
//!
//! ## Execution Control ([`exec`])
//! - [`exec::spawn`]: Child spawn, stdin feeding and buffered capture
//! - [`exec::runner`]: Validate, execute, report, forward
//!
//! ## Kernel Accounting ([`kernel`])
//! - [`kernel::resource`]: Child CPU time and peak memory via `getrusage`
//!
//! ## Reporting ([`report`])
//! - Per-invocation directories with `STDIN.log`, `STDOUT.log`, `STDERR.log`, `result.log`
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Structured audit events
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Shared type definitions and the crate error
//! - [`config::validator`]: Runner configuration checks
//!
//! # Design Principles
//!
//! 1. **Fail closed** - A network-shaped token with no parseable host is denied
//! 2. **Lexical only** - No DNS, no network probes
//! 3. **Record before forward** - Output reaches the caller only after it is on disk

// Network Policy
pub mod policy;

// Execution Control
pub mod exec;

// Kernel Accounting
pub mod kernel;

// Reporting
pub mod report;

// Observability
pub mod observability;

// Configuration
pub mod config;

// CLI entrypoint wiring for the autoapprove binary.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;

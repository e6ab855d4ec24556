//! Observability
//!
//! Structured audit events for every gate decision and execution.

pub mod audit;

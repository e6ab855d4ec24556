//! Configuration
//!
//! Shared types, runner configuration and its validation.

pub mod types;
pub mod validator;

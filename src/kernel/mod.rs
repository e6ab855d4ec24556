//! Thin wrappers around kernel accounting primitives.

pub mod resource;

//! Execution control
//!
//! Spawns the approved command, captures its streams and drives reporting.

pub mod runner;
pub mod spawn;

pub use runner::CommandRunner;
pub use spawn::{spawn_and_capture, SpawnFailure};

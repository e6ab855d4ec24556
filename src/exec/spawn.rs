/// Child process spawn and buffered capture
///
/// Stdin is written on a feeder thread while the main thread waits for the
/// child and drains stdout/stderr, so a large payload cannot deadlock against
/// a full output pipe. Nothing is streamed: both outputs are returned only
/// after the child has exited.
use crate::config::types::{CapturedOutput, Invocation};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

/// Exit code when the command binary cannot be found
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code when the command exists but cannot be executed
pub const EXIT_PERMISSION_DENIED: i32 = 126;
/// Exit code for every other failure
pub const EXIT_GENERAL_FAILURE: i32 = 1;

/// Why a child could not be run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnFailure {
    NotFound { command: String },
    PermissionDenied { command: String },
    Other { detail: String },
}

impl SpawnFailure {
    /// Classify a spawn-time I/O error
    pub fn from_io_error(command: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SpawnFailure::NotFound {
                command: command.to_string(),
            },
            io::ErrorKind::PermissionDenied => SpawnFailure::PermissionDenied {
                command: command.to_string(),
            },
            _ => SpawnFailure::Other {
                detail: err.to_string(),
            },
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            SpawnFailure::NotFound { .. } => EXIT_NOT_FOUND,
            SpawnFailure::PermissionDenied { .. } => EXIT_PERMISSION_DENIED,
            SpawnFailure::Other { .. } => EXIT_GENERAL_FAILURE,
        }
    }

    /// Synthetic stderr text recorded in place of child output
    pub fn message(&self) -> String {
        match self {
            SpawnFailure::NotFound { command } => format!("Command not found: {}", command),
            SpawnFailure::PermissionDenied { command } => {
                format!("Permission denied: {}", command)
            }
            SpawnFailure::Other { detail } => format!("Error executing command: {}", detail),
        }
    }

    /// Output recorded for a failed spawn: empty stdout, synthetic stderr
    pub fn into_output(self) -> CapturedOutput {
        CapturedOutput {
            exit_code: self.exit_code(),
            stdout: Vec::new(),
            stderr: self.message().into_bytes(),
        }
    }
}

impl std::fmt::Display for SpawnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Spawn the invocation in `workdir`, feed stdin, wait and capture both streams
pub fn spawn_and_capture(
    invocation: &Invocation,
    workdir: &Path,
) -> std::result::Result<CapturedOutput, SpawnFailure> {
    let mut command = Command::new(&invocation.command_name);
    command
        .args(&invocation.arguments)
        .current_dir(workdir)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| SpawnFailure::from_io_error(&invocation.command_name, &e))?;

    log::debug!(
        "Spawned '{}' as pid {}",
        invocation.command_name,
        child.id()
    );

    let feeder = match (child.stdin.take(), invocation.stdin.clone()) {
        (Some(mut pipe), Some(data)) => Some(thread::spawn(move || -> io::Result<()> {
            pipe.write_all(&data)?;
            pipe.flush()
        })),
        _ => None,
    };

    let output = child.wait_with_output().map_err(|e| SpawnFailure::Other {
        detail: e.to_string(),
    })?;

    if let Some(handle) = feeder {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                log::debug!("Child closed stdin before consuming all input");
            }
            Ok(Err(e)) => log::warn!("Failed to write stdin to child: {}", e),
            Err(_) => log::warn!("Stdin feeder thread panicked"),
        }
    }

    Ok(CapturedOutput {
        exit_code: exit_code_of(output.status),
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Exit code of a finished child; signal deaths map to `128 + signal`
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    EXIT_GENERAL_FAILURE
}

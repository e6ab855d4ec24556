/// Per-invocation report directories
///
/// One directory per executed invocation under
/// `<report_root>/autoapprove/<timestamp>-<command>`, holding the four audit
/// artifacts. Directory names are not checked for uniqueness: two runs of the
/// same command inside one millisecond share a directory.
use crate::config::types::{AutoApproveError, CapturedOutput, ExecutionRecord, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_SUBDIR: &str = "autoapprove";
pub const STDIN_LOG: &str = "STDIN.log";
pub const STDOUT_LOG: &str = "STDOUT.log";
pub const STDERR_LOG: &str = "STDERR.log";
pub const RESULT_LOG: &str = "result.log";

/// Keys of `result.log`, in file order
pub const RESULT_FIELDS: [&str; 9] = [
    "command",
    "working_directory",
    "exit_code",
    "start_time",
    "end_time",
    "duration_seconds",
    "cpu_user_time_seconds",
    "cpu_system_time_seconds",
    "max_memory_kb",
];

/// Filesystem-safe UTC timestamp with millisecond precision: `YYYY-MM-DDTHH-MM-SS.mmm`
pub fn directory_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S%.3f").to_string()
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`
pub fn sanitize_command_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A created report directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDirectory {
    path: PathBuf,
}

impl ReportDirectory {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn write_artifact(&self, name: &str, content: &[u8]) -> Result<()> {
        let path = self.artifact(name);
        fs::write(&path, content).map_err(|source| AutoApproveError::Report { path, source })
    }
}

/// Creates report directories and writes their artifacts
#[derive(Debug, Clone)]
pub struct ExecutionReporter {
    report_root: PathBuf,
}

impl ExecutionReporter {
    pub fn new(report_root: PathBuf) -> Self {
        Self { report_root }
    }

    pub fn report_root(&self) -> &Path {
        &self.report_root
    }

    /// Path a report for `command_name` started at `at` would live in
    pub fn report_path(&self, command_name: &str, at: DateTime<Utc>) -> PathBuf {
        self.report_root.join(REPORT_SUBDIR).join(format!(
            "{}-{}",
            directory_timestamp(at),
            sanitize_command_name(command_name)
        ))
    }

    /// Create `<root>/autoapprove/<timestamp>-<command>` and its parents
    pub fn create_report_directory(&self, command_name: &str) -> Result<ReportDirectory> {
        let path = self.report_path(command_name, Utc::now());

        fs::create_dir_all(&path).map_err(|source| AutoApproveError::Report {
            path: path.clone(),
            source,
        })?;

        log::debug!("Created report directory {}", path.display());
        Ok(ReportDirectory { path })
    }

    /// Write `STDIN.log`; an empty file when there is no stdin
    pub fn persist_stdin(&self, dir: &ReportDirectory, stdin: Option<&[u8]>) -> Result<()> {
        dir.write_artifact(STDIN_LOG, stdin.unwrap_or_default())
    }

    /// Write `STDOUT.log`, `STDERR.log` and `result.log`
    pub fn persist(
        &self,
        dir: &ReportDirectory,
        output: &CapturedOutput,
        record: &ExecutionRecord,
    ) -> Result<()> {
        dir.write_artifact(STDOUT_LOG, &output.stdout)?;
        dir.write_artifact(STDERR_LOG, &output.stderr)?;
        dir.write_artifact(RESULT_LOG, format_result_log(record).as_bytes())?;
        Ok(())
    }
}

/// Render an execution record as `key: value` lines
pub fn format_result_log(record: &ExecutionRecord) -> String {
    let mut out = String::new();
    let lines: [(&str, String); 9] = [
        ("command", record.command.clone()),
        (
            "working_directory",
            record.working_directory.display().to_string(),
        ),
        ("exit_code", record.exit_code.to_string()),
        (
            "start_time",
            record.start_time.to_rfc3339_opts(SecondsFormat::Micros, true),
        ),
        (
            "end_time",
            record.end_time.to_rfc3339_opts(SecondsFormat::Micros, true),
        ),
        ("duration_seconds", format!("{:.6}", record.duration_seconds)),
        (
            "cpu_user_time_seconds",
            format!("{:.6}", record.cpu_user_time_seconds),
        ),
        (
            "cpu_system_time_seconds",
            format!("{:.6}", record.cpu_system_time_seconds),
        ),
        ("max_memory_kb", record.max_memory_kb.to_string()),
    ];
    for (key, value) in lines {
        let _ = writeln!(out, "{}: {}", key, value);
    }
    out
}

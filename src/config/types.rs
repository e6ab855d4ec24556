/// Core types and structures for the autoapprove wrapper
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable overriding the report root directory
pub const ENV_REPORT_ROOT: &str = "AUTOAPPROVE_REPORT_ROOT";
/// Environment variable overriding the child's working directory
pub const ENV_WORKDIR: &str = "AUTOAPPROVE_WORKDIR";
/// Environment variable overriding the audit log location
pub const ENV_AUDIT_LOG: &str = "AUTOAPPROVE_AUDIT_LOG";

/// Default report root, relative to the working directory
pub const DEFAULT_REPORT_ROOT: &str = "test-output";

/// Runner configuration
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Root under which `autoapprove/<timestamp>-<command>` directories are created
    pub report_root: PathBuf,
    /// Working directory for the child (defaults to the process cwd)
    pub working_directory: Option<PathBuf>,
    /// Audit log file (defaults to a per-user file under the temp dir)
    pub audit_log: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            report_root: PathBuf::from(DEFAULT_REPORT_ROOT),
            working_directory: None,
            audit_log: None,
        }
    }
}

impl RunnerConfig {
    /// Default configuration overlaid with `AUTOAPPROVE_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(root) = env_path(ENV_REPORT_ROOT) {
            config.report_root = root;
        }
        if let Some(workdir) = env_path(ENV_WORKDIR) {
            config.working_directory = Some(workdir);
        }
        if let Some(audit) = env_path(ENV_AUDIT_LOG) {
            config.audit_log = Some(audit);
        }
        config
    }

    pub fn with_report_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.report_root = root.into();
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Resolve the directory the child runs in
    pub fn resolve_working_directory(&self) -> Result<PathBuf> {
        match &self.working_directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// One wrapped command invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub command_name: String,
    pub arguments: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    pub fn new(command_name: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            command_name: command_name.into(),
            arguments,
            stdin: None,
        }
    }

    /// Build from a full argv (command name first). Returns `None` when empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (command_name, arguments) = argv.split_first()?;
        Some(Self::new(command_name.clone(), arguments.to_vec()))
    }

    pub fn with_stdin(mut self, stdin: Option<Vec<u8>>) -> Self {
        self.stdin = stdin;
        self
    }

    /// Command name followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.command_name.clone())
            .chain(self.arguments.iter().cloned())
            .collect()
    }

    /// Space-joined command line as recorded in `result.log`
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

/// Outcome of network-argument validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub allowed: bool,
    /// Empty when allowed; names the offending token and category otherwise
    pub reason: String,
}

impl ValidationResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn deny(reason: String) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// CPU and memory consumption of completed children
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResourceUsage {
    pub user_time_seconds: f64,
    pub system_time_seconds: f64,
    pub max_memory_kb: u64,
}

impl ResourceUsage {
    /// CPU time consumed since `earlier`; peak memory is taken as-is
    pub fn since(&self, earlier: &ResourceUsage) -> ResourceUsage {
        ResourceUsage {
            user_time_seconds: (self.user_time_seconds - earlier.user_time_seconds).max(0.0),
            system_time_seconds: (self.system_time_seconds - earlier.system_time_seconds)
                .max(0.0),
            max_memory_kb: self.max_memory_kb,
        }
    }
}

/// Immutable audit record of one execution, persisted as `result.log` and
/// attached to the `ExecutionEnd` audit event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub command: String,
    pub working_directory: PathBuf,
    pub exit_code: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub cpu_user_time_seconds: f64,
    pub cpu_system_time_seconds: f64,
    pub max_memory_kb: u64,
}

/// Captured child output (or the synthetic spawn-failure message)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// What `CommandRunner::run` hands back to its caller
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub validation: ValidationResult,
    /// Absent when validation denied the invocation
    pub report_dir: Option<PathBuf>,
    pub record: Option<ExecutionRecord>,
}

/// Error types for the wrapper
#[derive(Error, Debug)]
pub enum AutoApproveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report error at {}: {source}", .path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for autoapprove operations
pub type Result<T> = std::result::Result<T, AutoApproveError>;

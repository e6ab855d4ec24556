/// Audit event logging for autoapprove
/// Records every gate decision and execution outcome as a JSON line, next to
/// the per-invocation report directory.
///
/// - Correlation ids (run_id, command, report directory)
/// - Event types: validation denied/bypassed, execution start/end, spawn failure, report failure
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use uuid::Uuid;

use crate::config::types::{AutoApproveError, ExecutionRecord, Result};
use crate::exec::spawn::EXIT_PERMISSION_DENIED;

/// Audit event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Types of audit events we track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    // Gate decisions
    ValidationDenied,
    ValidationBypassed,

    // Lifecycle events
    ExecutionStart,
    ExecutionEnd,

    // Failures
    SpawnFailure,
    ReportFailure,
}

impl AuditEventType {
    /// Get the default severity for this event type
    pub fn default_severity(&self) -> AuditSeverity {
        match self {
            AuditEventType::ValidationDenied => AuditSeverity::Medium,
            AuditEventType::ValidationBypassed => AuditSeverity::Medium,
            AuditEventType::ExecutionStart => AuditSeverity::Low,
            AuditEventType::ExecutionEnd => AuditSeverity::Low,
            AuditEventType::SpawnFailure => AuditSeverity::Medium,
            AuditEventType::ReportFailure => AuditSeverity::Critical,
        }
    }
}

/// Correlation identifiers for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationIds {
    /// Unique run identifier
    pub run_id: String,
    /// Full command line
    pub command: String,
    /// Report directory, once created
    pub report_dir: Option<PathBuf>,
    /// Wrapper process id
    pub wrapper_pid: u32,
}

impl CorrelationIds {
    pub fn new(command: String) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            command,
            report_dir: None,
            wrapper_pid: std::process::id(),
        }
    }

    pub fn with_report_dir(mut self, report_dir: &Path) -> Self {
        self.report_dir = Some(report_dir.to_path_buf());
        self
    }
}

/// Individual audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub timestamp: DateTime<Utc>,
    pub details: String,
    pub correlation: Option<CorrelationIds>,
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ExecutionRecord>,
}

impl AuditEvent {
    /// Create a new audit event with default severity
    pub fn new(event_type: AuditEventType, details: String) -> Self {
        Self {
            severity: event_type.default_severity(),
            event_type,
            timestamp: Utc::now(),
            details,
            correlation: None,
            exit_code: None,
            record: None,
        }
    }

    pub fn with_correlation(mut self, correlation: CorrelationIds) -> Self {
        self.correlation = Some(correlation);
        self
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_record(mut self, record: ExecutionRecord) -> Self {
        self.exit_code = Some(record.exit_code);
        self.record = Some(record);
        self
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Audit logger writing one JSON object per line
pub struct AuditLogger {
    audit_file: Arc<Mutex<File>>,
    audit_path: PathBuf,
}

impl AuditLogger {
    /// Open (or create) the audit file, creating parents as needed
    pub fn new(audit_path: Option<PathBuf>) -> Result<Self> {
        let audit_path = audit_path.unwrap_or_else(default_audit_path);

        if let Some(parent) = audit_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AutoApproveError::Config(format!("Failed to create audit log directory: {}", e))
                })?;
            }
        }

        let audit_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&audit_path)
            .map_err(|e| AutoApproveError::Config(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            audit_file: Arc::new(Mutex::new(audit_file)),
            audit_path,
        })
    }

    /// Emit an event to the log facade and append it to the audit file
    pub fn log_event(&self, event: &AuditEvent) {
        emit_to_log(event);

        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        if let Ok(mut file) = self.audit_file.lock() {
            if let Err(e) = writeln!(file, "{}", line) {
                error!("Failed to write to audit log: {}", e);
            }
            if let Err(e) = file.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        } else {
            error!("Failed to acquire lock on audit file");
        }
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }
}

fn default_audit_path() -> PathBuf {
    std::env::temp_dir().join("autoapprove").join("audit.log")
}

#[cfg(unix)]
fn user_tag() -> String {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }.to_string()
}

#[cfg(not(unix))]
fn user_tag() -> String {
    "user".to_string()
}

fn emit_to_log(event: &AuditEvent) {
    match event.severity {
        AuditSeverity::Critical | AuditSeverity::High => {
            error!("AUDIT {:?}: {:?} - {}", event.severity, event.event_type, event.details);
        }
        AuditSeverity::Medium => {
            warn!("AUDIT {:?}: {:?} - {}", event.severity, event.event_type, event.details);
        }
        AuditSeverity::Low => {
            info!("AUDIT {:?}: {:?} - {}", event.severity, event.event_type, event.details);
        }
    }
}

/// Global audit logger instance
static AUDIT_LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Initialize the global audit logger.
///
/// Without an explicit path, falls back to per-user locations and finally to
/// log-only auditing. An explicit path that cannot be opened is an error.
pub fn init_audit_logger(audit_path: Option<PathBuf>) -> Result<()> {
    match AuditLogger::new(audit_path.clone()) {
        Ok(logger) => install(logger),
        Err(e) => {
            if audit_path.is_some() {
                error!("Failed to initialize audit logger: {}", e);
                return Err(e);
            }

            let fallback_paths = vec![
                std::env::temp_dir().join(format!("autoapprove-audit-{}.log", user_tag())),
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(std::env::temp_dir)
                    .join(".autoapprove")
                    .join("audit.log"),
            ];

            for fallback in fallback_paths {
                match AuditLogger::new(Some(fallback.clone())) {
                    Ok(logger) => {
                        warn!("Audit logger using fallback path: {}", fallback.display());
                        install(logger);
                        return Ok(());
                    }
                    Err(fallback_err) => {
                        warn!(
                            "Failed to open fallback audit log at {}: {}",
                            fallback.display(),
                            fallback_err
                        );
                    }
                }
            }

            warn!("Audit log file unavailable, continuing with log-only auditing: {}", e);
        }
    }
    Ok(())
}

fn install(logger: AuditLogger) {
    let path = logger.audit_path().to_path_buf();
    if AUDIT_LOGGER.set(logger).is_err() {
        warn!("Audit logger already initialized");
    } else {
        info!("Audit logger initialized at {}", path.display());
    }
}

/// Log an audit event using the global logger, or the log facade alone
pub fn log_audit_event(event: AuditEvent) {
    match AUDIT_LOGGER.get() {
        Some(logger) => logger.log_event(&event),
        None => emit_to_log(&event),
    }
}

/// Log a validation denial
pub fn validation_denied(correlation: CorrelationIds, reason: &str) {
    let event = AuditEvent::new(
        AuditEventType::ValidationDenied,
        format!("Network validation denied: {}", reason),
    )
    .with_correlation(correlation)
    .with_exit_code(1);

    log_audit_event(event);
}

/// Log that validation was explicitly skipped
pub fn validation_bypassed(correlation: CorrelationIds) {
    let event = AuditEvent::new(
        AuditEventType::ValidationBypassed,
        format!("Network validation skipped for: {}", correlation.command),
    )
    .with_correlation(correlation);

    log_audit_event(event);
}

/// Log execution start
pub fn execution_start(correlation: CorrelationIds) {
    let event = AuditEvent::new(
        AuditEventType::ExecutionStart,
        format!("Execution started: run_id={}", correlation.run_id),
    )
    .with_correlation(correlation);

    log_audit_event(event);
}

/// Log execution end, carrying the full execution record
pub fn execution_end(correlation: CorrelationIds, record: &ExecutionRecord) {
    log_audit_event(execution_end_event(correlation, record));
}

fn execution_end_event(correlation: CorrelationIds, record: &ExecutionRecord) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::ExecutionEnd,
        format!(
            "Execution ended: run_id={}, exit_code={}, duration={:.6}s",
            correlation.run_id, record.exit_code, record.duration_seconds
        ),
    )
    .with_correlation(correlation)
    .with_record(record.clone())
}

/// Log a spawn failure; permission denials are raised to High
pub fn spawn_failure(correlation: CorrelationIds, message: &str, exit_code: i32) {
    log_audit_event(spawn_failure_event(correlation, message, exit_code));
}

fn spawn_failure_event(correlation: CorrelationIds, message: &str, exit_code: i32) -> AuditEvent {
    let event = AuditEvent::new(
        AuditEventType::SpawnFailure,
        format!("Spawn failed: {}", message),
    )
    .with_correlation(correlation)
    .with_exit_code(exit_code);

    if exit_code == EXIT_PERMISSION_DENIED {
        event.with_severity(AuditSeverity::High)
    } else {
        event
    }
}

/// Log a failure to create or write the report directory
pub fn report_failure(correlation: CorrelationIds, error: &AutoApproveError) {
    let event = AuditEvent::new(
        AuditEventType::ReportFailure,
        format!("Report could not be written: {}", error),
    )
    .with_correlation(correlation);

    log_audit_event(event);
}

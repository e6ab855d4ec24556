use crate::config::types::{
    CapturedOutput, ExecutionRecord, Invocation, Result, RunOutcome, RunnerConfig,
    ValidationResult,
};
use crate::config::validator::validate_config;
use crate::exec::spawn::{spawn_and_capture, EXIT_GENERAL_FAILURE};
use crate::kernel::resource::{create_resource_sampler, ResourceSampler};
use crate::observability::audit::{self, CorrelationIds};
/// Validate, execute, report and forward one invocation
use crate::policy::validator::InvocationValidator;
use crate::report::{ExecutionReporter, ReportDirectory};
use chrono::Utc;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Second diagnostic line printed on denial
pub const LOOPBACK_ONLY_NOTICE: &str =
    "Only loopback addresses (127.0.0.1, ::1, localhost) are allowed.";
/// Third diagnostic line printed on denial
pub const SKIP_VALIDATION_HINT: &str =
    "Use --skip-validation to bypass this check (use with caution).";

/// Top-level pipeline: gate, spawn, capture, report, forward
pub struct CommandRunner {
    working_directory: PathBuf,
    reporter: ExecutionReporter,
    sampler: Box<dyn ResourceSampler>,
}

impl CommandRunner {
    /// Build a runner; the config is validated and the sampler selected here
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let validation = validate_config(&config)?;
        for warning in validation.warnings {
            log::warn!("Configuration warning: {}", warning);
        }

        let working_directory = config.resolve_working_directory()?;
        let report_root = if config.report_root.is_absolute() {
            config.report_root.clone()
        } else {
            working_directory.join(&config.report_root)
        };

        let sampler = create_resource_sampler();
        log::debug!(
            "Runner ready: workdir={}, report_root={}, sampler={}",
            working_directory.display(),
            report_root.display(),
            sampler.name()
        );

        Ok(Self {
            working_directory,
            reporter: ExecutionReporter::new(report_root),
            sampler,
        })
    }

    /// Replace the resource sampler
    pub fn with_sampler(mut self, sampler: Box<dyn ResourceSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn reporter(&self) -> &ExecutionReporter {
        &self.reporter
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Run against the process's own stdout/stderr
    pub fn run(&self, invocation: &Invocation, skip_validation: bool) -> Result<RunOutcome> {
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.run_with_streams(
            invocation,
            skip_validation,
            &mut stdout.lock(),
            &mut stderr.lock(),
        )
    }

    /// Run, forwarding captured output and diagnostics to the given streams.
    ///
    /// Only a reporting failure is returned as `Err`; every child outcome,
    /// including spawn failures, becomes an exit code.
    pub fn run_with_streams(
        &self,
        invocation: &Invocation,
        skip_validation: bool,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<RunOutcome> {
        let correlation = CorrelationIds::new(invocation.command_line());

        let validation = if skip_validation {
            audit::validation_bypassed(correlation.clone());
            ValidationResult::allow()
        } else {
            InvocationValidator::validate(invocation)
        };

        if !validation.allowed {
            audit::validation_denied(correlation, &validation.reason);
            write_denial(err, &validation.reason);
            return Ok(RunOutcome {
                exit_code: EXIT_GENERAL_FAILURE,
                validation,
                report_dir: None,
                record: None,
            });
        }

        let report_dir = self
            .reporter
            .create_report_directory(&invocation.command_name)
            .map_err(|e| {
                audit::report_failure(correlation.clone(), &e);
                e
            })?;
        let correlation = correlation.with_report_dir(report_dir.path());

        self.reporter
            .persist_stdin(&report_dir, invocation.stdin.as_deref())
            .map_err(|e| {
                audit::report_failure(correlation.clone(), &e);
                e
            })?;

        audit::execution_start(correlation.clone());
        let (output, record) = self.execute(invocation, &correlation);

        self.persist(&report_dir, &output, &record)
            .map_err(|e| {
                audit::report_failure(correlation.clone(), &e);
                e
            })?;
        audit::execution_end(correlation, &record);

        forward(out, &output.stdout, "stdout");
        forward(err, &output.stderr, "stderr");

        Ok(RunOutcome {
            exit_code: record.exit_code,
            validation,
            report_dir: Some(report_dir.path().to_path_buf()),
            record: Some(record),
        })
    }

    /// Spawn and wait for the child, timing it and sampling resources
    fn execute(
        &self,
        invocation: &Invocation,
        correlation: &CorrelationIds,
    ) -> (CapturedOutput, ExecutionRecord) {
        let before = self.sampler.sample();
        let start_time = Utc::now();
        let started = Instant::now();

        let output = match spawn_and_capture(invocation, &self.working_directory) {
            Ok(output) => output,
            Err(failure) => {
                log::warn!("{}", failure);
                audit::spawn_failure(correlation.clone(), &failure.message(), failure.exit_code());
                failure.into_output()
            }
        };

        let duration = started.elapsed();
        let end_time = Utc::now();
        let usage = self.sampler.sample().since(&before);

        let record = ExecutionRecord {
            command: invocation.command_line(),
            working_directory: self.working_directory.clone(),
            exit_code: output.exit_code,
            start_time,
            end_time,
            duration_seconds: duration.as_secs_f64(),
            cpu_user_time_seconds: usage.user_time_seconds,
            cpu_system_time_seconds: usage.system_time_seconds,
            max_memory_kb: usage.max_memory_kb,
        };

        (output, record)
    }

    fn persist(
        &self,
        dir: &ReportDirectory,
        output: &CapturedOutput,
        record: &ExecutionRecord,
    ) -> Result<()> {
        self.reporter.persist(dir, output, record)?;
        log::info!(
            "Report written to {} (exit code {})",
            dir.path().display(),
            record.exit_code
        );
        Ok(())
    }
}

fn write_denial(err: &mut dyn Write, reason: &str) {
    let _ = writeln!(err, "Error: Network validation failed: {}", reason);
    let _ = writeln!(err, "{}", LOOPBACK_ONLY_NOTICE);
    let _ = writeln!(err, "{}", SKIP_VALIDATION_HINT);
    let _ = err.flush();
}

// The report is already on disk; a closed caller stream must not change the exit code.
fn forward(stream: &mut dyn Write, bytes: &[u8], name: &str) {
    if bytes.is_empty() {
        return;
    }
    if let Err(e) = stream.write_all(bytes).and_then(|_| stream.flush()) {
        log::warn!("Failed to forward child {} to caller: {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ResourceUsage;
    use crate::report::{RESULT_LOG, STDERR_LOG, STDIN_LOG, STDOUT_LOG};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSampler {
        calls: Arc<AtomicUsize>,
    }

    impl ResourceSampler for CountingSampler {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn sample(&self) -> ResourceUsage {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as f64;
            ResourceUsage {
                user_time_seconds: n * 0.5,
                system_time_seconds: n * 0.25,
                max_memory_kb: 1000 + n as u64,
            }
        }
    }

    fn runner(root: &Path) -> CommandRunner {
        let config = RunnerConfig::default()
            .with_report_root(root)
            .with_working_directory(root);
        CommandRunner::new(config).unwrap()
    }

    fn invocation(argv: &[&str]) -> Invocation {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        Invocation::from_argv(&argv).unwrap()
    }

    #[test]
    fn test_denied_invocation_spawns_nothing() {
        let root = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = runner(root.path()).with_sampler(Box::new(CountingSampler {
            calls: calls.clone(),
        }));

        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = runner
            .run_with_streams(
                &invocation(&["curl", "http://example.com/api"]),
                false,
                &mut out,
                &mut err,
            )
            .unwrap();

        assert_eq!(outcome.exit_code, 1);
        assert!(!outcome.validation.allowed);
        assert!(outcome.report_dir.is_none());
        assert!(outcome.record.is_none());
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!root.path().join("autoapprove").exists());

        let diagnostics = String::from_utf8(err).unwrap();
        let lines: Vec<&str> = diagnostics.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Error: Network validation failed: "));
        assert!(lines[0].contains("http://example.com/api"));
        assert_eq!(lines[1], LOOPBACK_ONLY_NOTICE);
        assert_eq!(lines[2], SKIP_VALIDATION_HINT);
    }

    #[test]
    fn test_sampler_delta_recorded() {
        let root = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = runner(root.path()).with_sampler(Box::new(CountingSampler {
            calls: calls.clone(),
        }));

        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = runner
            .run_with_streams(&invocation(&["true"]), false, &mut out, &mut err)
            .unwrap();

        let record = outcome.record.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!((record.cpu_user_time_seconds - 0.5).abs() < 1e-9);
        assert!((record.cpu_system_time_seconds - 0.25).abs() < 1e-9);
        assert_eq!(record.max_memory_kb, 1001);
    }

    #[cfg(unix)]
    #[test]
    fn test_output_forwarded_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner(root.path());

        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = runner
            .run_with_streams(
                &invocation(&["sh", "-c", "printf 'a\\nb'; printf 'warn' >&2; exit 4"]),
                false,
                &mut out,
                &mut err,
            )
            .unwrap();

        assert_eq!(outcome.exit_code, 4);
        assert_eq!(out, b"a\nb");
        assert_eq!(err, b"warn");

        let dir = outcome.report_dir.unwrap();
        assert_eq!(std::fs::read(dir.join(STDOUT_LOG)).unwrap(), b"a\nb");
        assert_eq!(std::fs::read(dir.join(STDERR_LOG)).unwrap(), b"warn");
        assert_eq!(std::fs::read(dir.join(STDIN_LOG)).unwrap(), b"");
        let result = std::fs::read_to_string(dir.join(RESULT_LOG)).unwrap();
        assert!(result.contains("exit_code: 4\n"));
    }

    #[test]
    fn test_skip_validation_runs_denied_command() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner(root.path());

        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = runner
            .run_with_streams(
                &invocation(&["nonexistent_command_xyz", "http://example.com"]),
                true,
                &mut out,
                &mut err,
            )
            .unwrap();

        assert!(outcome.validation.allowed);
        assert_eq!(outcome.exit_code, 127);
        assert_eq!(err, b"Command not found: nonexistent_command_xyz");
        assert!(outcome.report_dir.unwrap().join(RESULT_LOG).is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let script = root.path().join("not-executable.sh");
        std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();

        let runner = runner(root.path());
        let mut out = Vec::new();
        let mut err = Vec::new();
        let script_arg = script.to_string_lossy().to_string();
        let outcome = runner
            .run_with_streams(&invocation(&[&script_arg]), false, &mut out, &mut err)
            .unwrap();

        assert_eq!(outcome.exit_code, 126);
        assert!(out.is_empty());
        assert!(String::from_utf8(err).unwrap().starts_with("Permission denied: "));
    }

    #[test]
    fn test_report_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let config = RunnerConfig::default()
            .with_report_root(blocker.join("nested"))
            .with_working_directory(root.path());
        let runner = CommandRunner::new(config).unwrap();

        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = runner.run_with_streams(&invocation(&["true"]), false, &mut out, &mut err);
        assert!(matches!(
            result,
            Err(crate::config::types::AutoApproveError::Report { .. })
        ));
    }
}

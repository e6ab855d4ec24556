//! End-to-end tests against the built `autoapprove` binary

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn autoapprove(workdir: &Path, args: &[&str], stdin: Option<&[u8]>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_autoapprove"))
        .args(args)
        .current_dir(workdir)
        .env("AUTOAPPROVE_AUDIT_LOG", workdir.join("audit.log"))
        .env_remove("AUTOAPPROVE_REPORT_ROOT")
        .env_remove("AUTOAPPROVE_WORKDIR")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut pipe = child.stdin.take().unwrap();
    if let Some(data) = stdin {
        pipe.write_all(data).unwrap();
    }
    drop(pipe);

    child.wait_with_output().unwrap()
}

fn report_dirs(workdir: &Path) -> Vec<std::path::PathBuf> {
    let base = workdir.join("test-output").join("autoapprove");
    match std::fs::read_dir(base) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_no_command_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let output = autoapprove(dir.path(), &[], None);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage:"));
}

#[test]
fn test_denied_url_exits_one_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let output = autoapprove(dir.path(), &["curl", "https://example.com/data"], None);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Error: Network validation failed: "));
    assert_eq!(
        lines[1],
        "Only loopback addresses (127.0.0.1, ::1, localhost) are allowed."
    );
    assert_eq!(
        lines[2],
        "Use --skip-validation to bypass this check (use with caution)."
    );
    assert!(report_dirs(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_skip_validation_propagates_child_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = autoapprove(
        dir.path(),
        &["--skip-validation", "sh", "-c", "exit 7", "http://example.com"],
        None,
    );
    assert_eq!(output.status.code(), Some(7));
    assert_eq!(report_dirs(dir.path()).len(), 1);
}

#[cfg(unix)]
#[test]
fn test_piped_stdin_reaches_child_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let output = autoapprove(dir.path(), &["cat"], Some(b"from the pipe"));
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(output.stdout, b"from the pipe");

    let reports = report_dirs(dir.path());
    assert_eq!(reports.len(), 1);
    assert_eq!(
        std::fs::read(reports[0].join("STDIN.log")).unwrap(),
        b"from the pipe"
    );
}

#[test]
fn test_missing_command_exits_127() {
    let dir = tempfile::tempdir().unwrap();
    let output = autoapprove(dir.path(), &["nonexistent_command_xyz"], None);
    assert_eq!(output.status.code(), Some(127));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn test_audit_log_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = autoapprove(dir.path(), &["curl", "http://10.0.0.1/"], None);
    assert_eq!(output.status.code(), Some(1));

    let audit = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
    let event: serde_json::Value = serde_json::from_str(audit.lines().next().unwrap()).unwrap();
    assert_eq!(event["event_type"], "ValidationDenied");
}

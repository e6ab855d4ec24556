use crate::config::types::{Invocation, RunnerConfig};
use crate::exec::runner::CommandRunner;
use crate::exec::spawn::EXIT_GENERAL_FAILURE;
use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read, Write};

#[derive(Parser, Debug)]
#[command(
    name = "autoapprove",
    author,
    version,
    about = "Run a command only if every network target in its arguments is loopback",
    long_about = None
)]
struct Cli {
    /// Run the command even if its arguments reference non-loopback hosts
    #[arg(long)]
    skip_validation: bool,
    /// Command to run, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,
}

/// Binary entry point; returns the process exit code
pub fn run() -> Result<i32> {
    // Initialize structured logging
    env_logger::init();

    let config = RunnerConfig::from_env();

    if let Err(e) = crate::observability::audit::init_audit_logger(config.audit_log.clone()) {
        log::warn!("Audit trail disabled: {}", e);
    }

    let stdout = io::stdout();
    let stderr = io::stderr();
    dispatch(
        std::env::args_os(),
        config,
        read_piped_stdin,
        &mut stdout.lock(),
        &mut stderr.lock(),
    )
}

/// Parse `args`, then run the command they name.
///
/// `read_stdin` is only called once a command is known to exist, so
/// `--help` never blocks on an open pipe.
pub fn dispatch<I, T, F>(
    args: I,
    config: RunnerConfig,
    read_stdin: F,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce() -> io::Result<Option<Vec<u8>>>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let rendered = e.render().to_string();
            if e.use_stderr() {
                let _ = write!(err, "{}", rendered);
                return Ok(EXIT_GENERAL_FAILURE);
            }
            // --help / --version
            let _ = write!(out, "{}", rendered);
            return Ok(0);
        }
    };

    let Some(invocation) = Invocation::from_argv(&cli.command) else {
        let usage = Cli::command().render_usage().to_string();
        let _ = writeln!(err, "Error: no command given");
        let _ = writeln!(err, "{}", usage);
        return Ok(EXIT_GENERAL_FAILURE);
    };

    let stdin = match read_stdin() {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Failed to read stdin, running without input: {}", e);
            None
        }
    };
    let invocation = invocation.with_stdin(stdin);

    let runner = CommandRunner::new(config)?;
    let outcome = runner.run_with_streams(&invocation, cli.skip_validation, out, err)?;

    log::debug!(
        "'{}' finished with exit code {}",
        invocation.command_line(),
        outcome.exit_code
    );
    Ok(outcome.exit_code)
}

/// Read all of stdin unless it is an interactive terminal
pub fn read_piped_stdin() -> io::Result<Option<Vec<u8>>> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut data = Vec::new();
    stdin.read_to_end(&mut data)?;
    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config(root: &Path) -> RunnerConfig {
        RunnerConfig::default()
            .with_report_root(root)
            .with_working_directory(root)
    }

    fn no_stdin() -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    #[test]
    fn test_parse_passes_hyphen_args_through() {
        let cli = Cli::try_parse_from(["autoapprove", "ls", "-la", "--color=never"]).unwrap();
        assert!(!cli.skip_validation);
        assert_eq!(cli.command, vec!["ls", "-la", "--color=never"]);
    }

    #[test]
    fn test_parse_skip_validation_only_before_command() {
        let cli =
            Cli::try_parse_from(["autoapprove", "--skip-validation", "curl", "http://x.org"])
                .unwrap();
        assert!(cli.skip_validation);
        assert_eq!(cli.command, vec!["curl", "http://x.org"]);

        let cli = Cli::try_parse_from(["autoapprove", "echo", "--skip-validation"]).unwrap();
        assert!(!cli.skip_validation);
        assert_eq!(cli.command, vec!["echo", "--skip-validation"]);
    }

    #[test]
    fn test_no_command_is_usage_error() {
        let root = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = dispatch(
            ["autoapprove"],
            config(root.path()),
            || -> io::Result<Option<Vec<u8>>> { panic!("stdin must not be read") },
            &mut out,
            &mut err,
        )
        .unwrap();
        assert_eq!(code, 1);
        assert!(String::from_utf8(err).unwrap().contains("Usage:"));
    }

    #[test]
    fn test_help_exits_zero() {
        let root = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = dispatch(
            ["autoapprove", "--help"],
            config(root.path()),
            no_stdin,
            &mut out,
            &mut err,
        )
        .unwrap();
        assert_eq!(code, 0);
        assert!(String::from_utf8(out).unwrap().contains("--skip-validation"));
    }

    #[test]
    fn test_denied_url_exits_one() {
        let root = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = dispatch(
            ["autoapprove", "curl", "https://example.com"],
            config(root.path()),
            no_stdin,
            &mut out,
            &mut err,
        )
        .unwrap();
        assert_eq!(code, 1);
        assert!(String::from_utf8(err)
            .unwrap()
            .starts_with("Error: Network validation failed: "));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_forwarded() {
        let root = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = dispatch(
            ["autoapprove", "cat"],
            config(root.path()),
            || Ok(Some(b"piped".to_vec())),
            &mut out,
            &mut err,
        )
        .unwrap();
        assert_eq!(code, 0);
        assert_eq!(out, b"piped");
    }
}

// Runner config validation
// Checked once when the runner is built, before any invocation is handled

use crate::config::types::{AutoApproveError, Result, RunnerConfig};

/// Validation result with detailed errors
#[derive(Debug)]
pub struct ConfigValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for ConfigValidation {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate runner config at startup. Errors are fatal; warnings are returned.
pub fn validate_config(config: &RunnerConfig) -> Result<ConfigValidation> {
    let mut result = ConfigValidation::new();

    validate_report_root(config, &mut result);
    validate_working_directory(config, &mut result);
    validate_audit_log(config, &mut result);

    if !result.is_valid() {
        return Err(AutoApproveError::Config(format!(
            "Runner config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_report_root(config: &RunnerConfig, result: &mut ConfigValidation) {
    if config.report_root.as_os_str().is_empty() {
        result.add_error("report_root cannot be empty".to_string());
        return;
    }

    if config.report_root.exists() && !config.report_root.is_dir() {
        result.add_error(format!(
            "report_root exists but is not a directory: {:?}",
            config.report_root
        ));
    }

    // Temp dirs get reaped; audit records there may not survive.
    if config.report_root.is_absolute() && config.report_root.starts_with(std::env::temp_dir()) {
        result.add_warning(format!(
            "report_root {:?} is under the system temp directory; reports may be cleaned up",
            config.report_root
        ));
    }
}

fn validate_working_directory(config: &RunnerConfig, result: &mut ConfigValidation) {
    if let Some(ref workdir) = config.working_directory {
        if !workdir.is_dir() {
            result.add_error(format!(
                "working_directory does not exist or is not a directory: {:?}",
                workdir
            ));
        }
    }
}

fn validate_audit_log(config: &RunnerConfig, result: &mut ConfigValidation) {
    if let Some(ref audit_log) = config.audit_log {
        if audit_log.is_dir() {
            result.add_error(format!("audit_log points at a directory: {:?}", audit_log));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_default_config() {
        let config = RunnerConfig::default();
        let result = validate_config(&config);
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_report_root_rejected() {
        let config = RunnerConfig::default().with_report_root("");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("report_root cannot be empty"));
    }

    #[test]
    fn test_missing_working_directory_rejected() {
        let config = RunnerConfig::default()
            .with_working_directory("/definitely/not/a/real/autoapprove/dir");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("working_directory"));
    }

    #[test]
    fn test_report_root_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = RunnerConfig::default().with_report_root(file.path());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_temp_report_root_warns() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunnerConfig::default().with_report_root(dir.path());
        let result = validate_config(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("temp directory")));
    }

    #[test]
    fn test_audit_log_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunnerConfig::default();
        config.audit_log = Some(PathBuf::from(dir.path()));
        assert!(validate_config(&config).is_err());
    }
}

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One failed job of a parallel build, kept so every failure can be reported
/// after the whole pool has drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub unit: String,
    pub message: String,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFailures(pub Vec<BuildFailure>);

impl BuildFailures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BuildFailure> {
        self.0.iter()
    }

    pub fn units(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.unit.as_str()).collect()
    }
}

impl fmt::Display for BuildFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum WedError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unit '{unit}' has no build file for architecture '{architecture}'")]
    UnsupportedArchitecture { unit: String, architecture: String },

    #[error("Manifest not found at {}: {reason}", .path.display())]
    ManifestNotFound { path: PathBuf, reason: String },

    #[error("Container engine failed to {operation} {target}: {message}")]
    EngineError {
        operation: String,
        target: String,
        message: String,
    },

    #[error("{kind} not found: {name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Failed to {step} {dependency}: {stderr}")]
    FetchError {
        dependency: String,
        step: String,
        stderr: String,
    },

    #[error("{} of {total} builds failed for {package}: {failures}", .failures.len())]
    BuildsFailed {
        package: String,
        total: usize,
        failures: BuildFailures,
    },

    #[error("Install failed for: {}", .dependencies.join(", "))]
    InstallFailed { dependencies: Vec<String> },

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Manifest,
    Engine,
    Fetch,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl WedError {
    pub fn engine(
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        WedError::EngineError {
            operation: operation.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        WedError::ResourceNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        WedError::ConfigError {
            message: message.into(),
        }
    }

    /// Teardown paths swallow this instead of failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WedError::ResourceNotFound { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            WedError::ConfigError { .. }
            | WedError::MissingConfigError { .. }
            | WedError::InvalidConfigValueError { .. }
            | WedError::UnsupportedArchitecture { .. }
            | WedError::YamlError(_)
            | WedError::TomlError(_) => ErrorCategory::Configuration,
            WedError::ManifestNotFound { .. } => ErrorCategory::Manifest,
            WedError::EngineError { .. }
            | WedError::ResourceNotFound { .. }
            | WedError::BuildsFailed { .. } => ErrorCategory::Engine,
            WedError::FetchError { .. } | WedError::InstallFailed { .. } => ErrorCategory::Fetch,
            WedError::IoError(_) | WedError::SerializationError(_) | WedError::TaskError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            WedError::ResourceNotFound { .. } => ErrorSeverity::Low,
            WedError::FetchError { .. } | WedError::InstallFailed { .. } => ErrorSeverity::Medium,
            WedError::IoError(_) | WedError::TaskError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check seating_plan.yml and wedding_invite.yml for missing or invalid keys"
            }
            ErrorCategory::Manifest => "Run `wed install` to fetch dependencies before building",
            ErrorCategory::Engine => {
                "Make sure the container engine is running and inspect the reported unit"
            }
            ErrorCategory::Fetch => "Check the repository URL, branch name and your git credentials",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            WedError::ManifestNotFound { path, .. } => {
                format!("No wedding invite found at {}", path.display())
            }
            WedError::BuildsFailed {
                package, failures, ..
            } => format!(
                "{} image build(s) failed for {}",
                failures.len(),
                package
            ),
            WedError::InstallFailed { dependencies } => {
                format!("Could not fetch: {}", dependencies.join(", "))
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_failed_lists_every_unit() {
        let err = WedError::BuildsFailed {
            package: "svc".to_string(),
            total: 3,
            failures: BuildFailures(vec![
                BuildFailure {
                    unit: "api".to_string(),
                    message: "boom".to_string(),
                },
                BuildFailure {
                    unit: "worker".to_string(),
                    message: "no space".to_string(),
                },
            ]),
        };

        assert_eq!(
            err.to_string(),
            "2 of 3 builds failed for svc: api: boom; worker: no space"
        );
        assert_eq!(err.category(), ErrorCategory::Engine);
    }

    #[test]
    fn test_not_found_is_low_severity() {
        let err = WedError::not_found("container", "api-c");
        assert!(err.is_not_found());
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(!WedError::engine("run", "api", "conflict").is_not_found());
    }
}

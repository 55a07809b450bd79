//! CLI error handling

use std::fmt;

use kiln_errors::{BuildError, UserFacingError};

/// Why a kiln invocation ended unsuccessfully
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or merged
    Config(kiln_errors::ConfigError),
    /// A lifecycle step failed and the root package was not installed
    BuildFailed {
        node: String,
        step: String,
        cause: String,
    },
    /// The session was interrupted before the root was installed
    Cancelled,
    /// Any other error raised by an operation
    Ops(kiln_errors::Error),
    /// Writing output failed
    Io(std::io::Error),
}

impl CliError {
    /// Stable identifier for `--json` output and scripts
    pub fn code(&self) -> Option<&'static str> {
        match self {
            CliError::Config(e) => e.user_code(),
            CliError::BuildFailed { .. } => Some("build.step_failure"),
            CliError::Cancelled => Some("error.cancelled"),
            CliError::Ops(e) => e.user_code(),
            CliError::Io(_) => Some("cli.io"),
        }
    }

    /// Machine-readable form printed in `--json` mode
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let CliError::BuildFailed { node, step, cause } = self {
            value["node"] = node.clone().into();
            value["step"] = step.clone().into();
            value["cause"] = cause.clone().into();
        }
        value
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::BuildFailed { node, step, cause } => {
                write!(f, "Build failed: {node} at the {step} step\n  Cause: {cause}")?;
                write!(
                    f,
                    "\n  Hint: packages that do not depend on {node} were still built and cached."
                )
            }
            CliError::Cancelled => write!(
                f,
                "Build cancelled; packages installed before the interrupt stay cached."
            ),
            CliError::Ops(e) => {
                write!(f, "{}", e.user_message())?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                Ok(())
            }
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Ops(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::BuildFailed { .. } | CliError::Cancelled => None,
        }
    }
}

impl From<kiln_errors::ConfigError> for CliError {
    fn from(e: kiln_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<kiln_errors::Error> for CliError {
    fn from(e: kiln_errors::Error) -> Self {
        match e {
            kiln_errors::Error::Build(BuildError::StepFailure { node, step, cause }) => {
                CliError::BuildFailed { node, step, cause }
            }
            kiln_errors::Error::Cancelled => CliError::Cancelled,
            kiln_errors::Error::Config(e) => CliError::Config(e),
            other => CliError::Ops(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_keeps_node_and_step() {
        let err: CliError =
            kiln_errors::Error::from(BuildError::step_failure("zlib/1.3.1", "configure", "boom"))
                .into();

        let message = err.to_string();
        assert!(message.contains("zlib/1.3.1 at the configure step"));
        assert!(message.contains("Cause: boom"));

        let json = err.to_json();
        assert_eq!(json["node"], "zlib/1.3.1");
        assert_eq!(json["step"], "configure");
        assert_eq!(json["code"], "build.step_failure");
    }

    #[test]
    fn test_cancellation_and_config_errors_are_lifted() {
        assert!(matches!(
            CliError::from(kiln_errors::Error::Cancelled),
            CliError::Cancelled
        ));

        let config = kiln_errors::ConfigError::MissingField {
            field: "event_sender".to_string(),
        };
        assert!(matches!(
            CliError::from(kiln_errors::Error::from(config)),
            CliError::Config(_)
        ));
    }
}

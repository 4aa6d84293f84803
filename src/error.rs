use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LorewrightError {
    #[error("Inference server executable not found at {0}")]
    ExecutableNotFound(PathBuf),

    #[error("Model file not found at {0}")]
    ModelFileNotFound(PathBuf),

    #[error("No model configured for identifier '{0}'")]
    UnconfiguredModel(String),

    #[error("Unknown content type '{0}'")]
    UnknownContentType(String),

    #[error("Unknown output format '{0}'")]
    UnknownOutputFormat(String),

    #[error("Unknown style directive '{0}'")]
    UnknownStyle(String),

    #[error("Failed to launch inference server: {0}")]
    LaunchFailed(String),

    #[error("Inference server not healthy after {waited:?}{}", format_output(.output))]
    HealthTimeout { waited: Duration, output: String },

    #[error("Inference server exited during startup (code {code:?}){}", format_output(.output))]
    ProcessExited { code: Option<i32>, output: String },

    #[error("Completion request failed: {0}")]
    Transport(String),

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LorewrightError {
    /// Failures detected before any process is launched or request issued.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound(_)
                | Self::ModelFileNotFound(_)
                | Self::UnconfiguredModel(_)
                | Self::UnknownContentType(_)
                | Self::UnknownOutputFormat(_)
                | Self::UnknownStyle(_)
                | Self::ConfigError(_)
        )
    }

    /// Failures of the completion call itself; the loaded model stays loaded.
    pub fn is_completion_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::MalformedResponse(_))
    }
}

fn format_output(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!("; server output:\n{}", output.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(LorewrightError::UnknownContentType("x".into()).is_configuration_error());
        assert!(LorewrightError::ExecutableNotFound(PathBuf::from("/nope")).is_configuration_error());
        assert!(!LorewrightError::Transport("refused".into()).is_configuration_error());
        assert!(LorewrightError::MalformedResponse("no content".into()).is_completion_error());
    }

    #[test]
    fn test_health_timeout_message_includes_output() {
        let err = LorewrightError::HealthTimeout {
            waited: Duration::from_secs(3),
            output: "error: failed to load model\n".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3s"));
        assert!(msg.contains("failed to load model"));

        let quiet = LorewrightError::HealthTimeout {
            waited: Duration::from_secs(3),
            output: String::new(),
        };
        assert!(!quiet.to_string().contains("server output"));
    }
}

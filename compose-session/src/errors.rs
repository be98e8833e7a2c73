use std::{io, path::PathBuf, process};

#[derive(Debug, thiserror::Error)]
/// Top-level compose session errors.
pub enum ComposeSessionError {
    #[error(transparent)]
    ToolUnavailable(#[from] ToolUnavailable),
    #[error("invalid service selector: {reason}")]
    InvalidSelector { reason: String },
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: process::ExitStatus,
        stdout: String,
        stderr: String,
    },
}

impl ComposeSessionError {
    pub(crate) fn invalid_selector(reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            reason: reason.into(),
        }
    }

    /// True when the external tool could not be located for this session.
    #[must_use]
    pub const fn is_tool_unavailable(&self) -> bool {
        matches!(self, Self::ToolUnavailable(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
/// Outcome of a failed availability probe, replayed to every operation.
pub enum ToolUnavailable {
    #[error("{program} not found on PATH")]
    NotFound { program: String },
    #[error("failed to probe PATH for {program}: {reason}")]
    ProbeFailed { program: String, reason: String },
}

impl ToolUnavailable {
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::NotFound { program } | Self::ProbeFailed { program, .. } => program,
        }
    }
}

#[derive(Debug, thiserror::Error)]
/// Failures loading a session configuration file.
pub enum ConfigError {
    #[error("failed to read session config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse session config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_unavailable_converts_into_session_error() {
        let err: ComposeSessionError = ToolUnavailable::NotFound {
            program: "docker-compose".into(),
        }
        .into();

        assert!(err.is_tool_unavailable());
        assert_eq!(err.to_string(), "docker-compose not found on PATH");
    }

    #[test]
    fn probe_failure_keeps_program_name() {
        let err = ToolUnavailable::ProbeFailed {
            program: "docker".into(),
            reason: "cannot canonicalize".into(),
        };

        assert_eq!(err.program(), "docker");
        assert!(err.to_string().contains("cannot canonicalize"));
    }
}

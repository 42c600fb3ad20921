//! CLI-specific error types and exit codes.

use lipsync_core::{ConfigError, CueError};
use lipsync_runtime::{AnalyzerError, SinkError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// The cue file could not be read, parsed or written.
    #[error(transparent)]
    Cue(#[from] CueError),

    /// Settings failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A sink could not be created.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// The analyzer failed to run or exited with an error.
    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    /// A probe found the target unreachable.
    #[error("{0} is not reachable")]
    Unreachable(String),
}

impl CliError {
    /// Map error to an exit code (see sysexits.h).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cue(CueError::Io { .. }) => 66, // EX_NOINPUT
            Self::Cue(_) => 65,                   // EX_DATAERR
            Self::Config(_) => 78,                // EX_CONFIG
            Self::Sink(_) => 74,                  // EX_IOERR
            Self::Analyzer(_) => 71,              // EX_OSERR
            Self::Unreachable(_) => 69,           // EX_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::from(ConfigError::EmptyHost).exit_code(), 78);
        assert_eq!(
            CliError::from(CueError::CueNotFound(1.0)).exit_code(),
            65
        );
        assert_eq!(CliError::Unreachable("h:1".into()).exit_code(), 69);
    }

    #[test]
    fn test_messages() {
        let err = CliError::from(AnalyzerError::AlreadyRunning);
        assert_eq!(err.to_string(), "Analyzer error: An analysis is already running");
    }
}

//! Cue data error types.

use std::path::PathBuf;

/// Errors raised while loading, validating or editing cue data.
#[derive(Debug, thiserror::Error)]
pub enum CueError {
    /// The cue file could not be read or written.
    #[error("Cue file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cue document is not valid JSON or lacks `mouthCues`.
    #[error("Malformed cue document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A cue letter is outside the viseme alphabet.
    #[error("Unknown viseme symbol: {0:?}")]
    UnknownViseme(String),

    /// A cue has a non-finite bound or does not satisfy `start < end`.
    #[error("Invalid cue at index {index}: start={start}, end={end}")]
    InvalidInterval { index: usize, start: f64, end: f64 },

    /// Two cues overlap once sorted by start.
    #[error("Cue starting at {next_start} overlaps cue [{start}, {end})")]
    Overlap {
        start: f64,
        end: f64,
        next_start: f64,
    },

    /// No cue starts at the requested time.
    #[error("No cue starts at {0}")]
    CueNotFound(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = CueError::InvalidInterval {
            index: 2,
            start: 1.0,
            end: 0.5,
        };
        assert!(err.to_string().contains("index 2"));

        let err = CueError::Overlap {
            start: 0.0,
            end: 1.0,
            next_start: 0.5,
        };
        assert!(err.to_string().contains("overlaps"));
    }
}

//! Cue store: the sorted, validated set of viseme cues for one audio source.
//!
//! A [`CueSet`] is built once per analysis result and replaced wholesale when
//! a new file is analyzed. The only per-cue mutation is [`CueSet::set_value`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CueError;
use crate::viseme::Viseme;

/// Tolerance used when matching a cue by its start time.
const START_MATCH_EPSILON: f64 = 1e-9;

/// A single timestamped mouth shape valid over `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds (inclusive).
    pub start: f64,
    /// End time in seconds (exclusive).
    pub end: f64,
    /// Mouth shape shown during the interval.
    pub value: Viseme,
}

impl Cue {
    pub const fn new(start: f64, end: f64, value: Viseme) -> Self {
        Self { start, end, value }
    }

    /// Whether `t` falls inside the half-open interval `[start, end)`.
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start < self.end
    }
}

/// Optional analyzer metadata carried alongside the cues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// On-disk shape of an analyzer result.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CueDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<CueMetadata>,
    mouth_cues: Vec<Cue>,
}

/// Ordered, non-overlapping cues for one audio source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueSet {
    source: Option<PathBuf>,
    metadata: Option<CueMetadata>,
    cues: Vec<Cue>,
    dirty: bool,
}

impl CueSet {
    /// An empty set: nothing to dispatch.
    pub fn empty(source: Option<PathBuf>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Build a set from raw cues, sorting by start and rejecting invalid or
    /// overlapping intervals.
    pub fn new(
        source: Option<PathBuf>,
        metadata: Option<CueMetadata>,
        mut cues: Vec<Cue>,
    ) -> Result<Self, CueError> {
        if let Some((index, cue)) = cues.iter().enumerate().find(|(_, c)| !c.is_valid()) {
            return Err(CueError::InvalidInterval {
                index,
                start: cue.start,
                end: cue.end,
            });
        }

        cues.sort_by(|a, b| a.start.total_cmp(&b.start));

        if let Some(pair) = cues.windows(2).find(|w| w[1].start < w[0].end) {
            return Err(CueError::Overlap {
                start: pair[0].start,
                end: pair[0].end,
                next_start: pair[1].start,
            });
        }

        Ok(Self {
            source,
            metadata,
            cues,
            dirty: false,
        })
    }

    /// Parse an analyzer JSON document (`{"mouthCues": [...]}`).
    pub fn from_json(source: Option<PathBuf>, bytes: &[u8]) -> Result<Self, CueError> {
        let doc: CueDocument = serde_json::from_slice(bytes)?;
        Self::new(source, doc.metadata, doc.mouth_cues)
    }

    /// Read and parse a cue file.
    pub fn load(path: &Path) -> Result<Self, CueError> {
        let bytes = fs::read(path).map_err(|source| CueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::from_json(Some(path.to_path_buf()), &bytes)?;
        debug!(path = %path.display(), cues = set.len(), "Loaded cue file");
        Ok(set)
    }

    /// Load a cue file, treating any failure as "nothing to dispatch".
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(set) => set,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cue file unusable, nothing to dispatch");
                Self::empty(Some(path.to_path_buf()))
            }
        }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// The audio file (or cue file) this set was derived from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub const fn metadata(&self) -> Option<&CueMetadata> {
        self.metadata.as_ref()
    }

    /// Playback length: the analyzer's duration when known, otherwise the
    /// end of the last cue.
    pub fn duration(&self) -> f64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.duration)
            .or_else(|| self.cues.last().map(|c| c.end))
            .unwrap_or(0.0)
    }

    /// Whether an edit happened since the last load or save.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the value of the cue starting at `start`.
    pub fn set_value(&mut self, start: f64, value: Viseme) -> Result<(), CueError> {
        let cue = self
            .cues
            .iter_mut()
            .find(|c| (c.start - start).abs() < START_MATCH_EPSILON)
            .ok_or(CueError::CueNotFound(start))?;

        if cue.value != value {
            debug!(start, old = %cue.value, new = %value, "Cue value edited");
            cue.value = value;
            self.dirty = true;
        }
        Ok(())
    }

    /// The full analyzer document as JSON, as sent in init messages.
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "metadata": self.metadata,
            "mouthCues": self.cues,
        })
    }

    /// Write the set back to disk as pretty JSON and clear the dirty flag.
    pub fn save(&mut self, path: &Path) -> Result<(), CueError> {
        let doc = CueDocument {
            metadata: self.metadata.clone(),
            mouth_cues: self.cues.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        fs::write(path, json).map_err(|source| CueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.dirty = false;
        debug!(path = %path.display(), "Cue file saved");
        Ok(())
    }
}

//! The unit of data handed to every sink.

use serde::{Deserialize, Serialize};

use crate::cue::Cue;
use crate::locator::CueMatch;
use crate::policy::DispatchTrigger;
use crate::viseme::Viseme;

/// Text sent in place of a missing cue field on text-based wires.
pub const NONE_FIELD: &str = "None";

/// A located cue pair at a playback time, ready for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    /// Playback time (seconds) the lookup was made for.
    pub time: f64,
    /// Cue containing `time`, if any.
    pub active: Option<Cue>,
    /// Cue whose start is nearest to `time`, if within threshold.
    pub next: Option<Cue>,
}

impl DispatchEvent {
    pub const fn new(time: f64, found: CueMatch) -> Self {
        Self {
            time,
            active: found.active,
            next: found.nearest,
        }
    }

    pub fn active_value(&self) -> Option<Viseme> {
        self.active.map(|c| c.value)
    }

    pub fn next_start(&self) -> Option<f64> {
        self.next.map(|c| c.start)
    }

    pub fn next_end(&self) -> Option<f64> {
        self.next.map(|c| c.end)
    }

    pub fn next_value(&self) -> Option<Viseme> {
        self.next.map(|c| c.value)
    }

    /// Playback time formatted with three decimals, as downstream
    /// consumers expect.
    pub fn time_text(&self) -> String {
        format!("{:.3}", self.time)
    }
}

/// A dispatch event together with what caused it, as published to
/// observers of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmittedEvent {
    pub trigger: DispatchTrigger,
    pub event: DispatchEvent,
}

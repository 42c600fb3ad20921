//! Port definitions (trait abstractions) for the collaborators of dispatch.
//!
//! Ports contain no transport details. Sinks and clock adapters live in
//! `lipsync-runtime`; tests provide their own fakes.

use serde::{Deserialize, Serialize};

use crate::cue::CueSet;
use crate::event::DispatchEvent;

/// A network destination for dispatch events.
///
/// # Contract
///
/// `dispatch` and `announce` must never block: implementations enqueue
/// and return. Transport failures stay inside the sink and only show up
/// as logs or status changes.
#[cfg_attr(test, mockall::automock)]
pub trait CueSink: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Hand over one event for transmission.
    fn dispatch(&self, event: &DispatchEvent);

    /// Send the sink's init message, optionally carrying the cue document.
    #[allow(clippy::needless_lifetimes)]
    fn announce<'a>(&self, cues: Option<&'a CueSet>);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl CueSink for NoopSink {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn dispatch(&self, _event: &DispatchEvent) {
        // Intentionally do nothing
    }

    fn announce(&self, _cues: Option<&CueSet>) {}
}

/// Transport status reported by the external player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing loaded or playback stopped.
    #[default]
    Stopped,
    Playing,
    Paused,
    /// Playback reached the end of the track.
    Ended,
}

impl PlaybackStatus {
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Latest playback position reported by the player.
///
/// `seq` increases with every report, so a reader can tell a fresh sample
/// from one it has already seen even when the position is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClockSample {
    pub position: f64,
    pub seq: u64,
}

/// Read side of the playback clock.
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackClock: Send + Sync {
    fn sample(&self) -> ClockSample;

    fn status(&self) -> PlaybackStatus;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::CueMatch;
    use std::sync::Arc;

    #[test]
    fn test_noop_sink() {
        let sink: Arc<dyn CueSink> = Arc::new(NoopSink);
        sink.dispatch(&DispatchEvent::new(0.0, CueMatch::default()));
        sink.announce(None);
        assert_eq!(sink.name(), "noop");
    }

    #[test]
    fn test_mock_sink_records_calls() {
        let mut sink = MockCueSink::new();
        sink.expect_dispatch()
            .withf(|e| (e.time - 1.5).abs() < 1e-9)
            .times(1)
            .return_const(());

        sink.dispatch(&DispatchEvent::new(1.5, CueMatch::default()));
    }

    #[test]
    fn test_mock_sink_announce_with_and_without_cues() {
        let set = CueSet::empty(None);
        let mut sink = MockCueSink::new();
        sink.expect_announce()
            .withf(|cues| cues.is_some())
            .times(1)
            .return_const(());
        sink.expect_announce()
            .withf(|cues| cues.is_none())
            .times(1)
            .return_const(());

        sink.announce(Some(&set));
        sink.announce(None);
    }

    #[test]
    fn test_mock_clock() {
        let mut clock = MockPlaybackClock::new();
        clock.expect_status().return_const(PlaybackStatus::Paused);
        clock
            .expect_sample()
            .return_const(ClockSample { position: 3.0, seq: 7 });

        assert!(!clock.status().is_playing());
        assert_eq!(clock.sample().seq, 7);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PlaybackStatus::Ended).unwrap();
        assert_eq!(json, "\"ended\"");
    }
}

//! Dispatch policy: decides whether a located cue must be (re-)emitted.
//!
//! Playback-time sampling is irregular, so the same cue is seen on many
//! consecutive ticks. With `send_only_once` the [`TriggeredSet`] keeps each
//! cue key from being emitted twice in one playback session. Seeks and the
//! end-of-playback emission bypass the set.

use std::collections::HashSet;

use crate::config::DispatchConfig;
use crate::cue::Cue;
use crate::viseme::Viseme;

/// Identity of an emitted cue: its start and value.
///
/// The empty sentinel has its own key, so "no active cue" is also
/// deduplicated while playing through a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CueKey {
    start_bits: Option<u64>,
    value: Option<Viseme>,
}

impl CueKey {
    pub fn of(active: Option<&Cue>) -> Self {
        Self {
            start_bits: active.map(|c| c.start.to_bits()),
            value: active.map(|c| c.value),
        }
    }
}

/// Keys already emitted during the current playback session.
#[derive(Debug, Clone, Default)]
pub struct TriggeredSet {
    keys: HashSet<CueKey>,
}

impl TriggeredSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &CueKey) -> bool {
        self.keys.contains(key)
    }

    /// Record a key. Returns `false` if it was already present.
    pub fn insert(&mut self, key: CueKey) -> bool {
        self.keys.insert(key)
    }

    /// Forget everything; called when playback goes from stopped to playing.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// What caused the candidate emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchTrigger {
    /// Regular tick of the dispatch loop while playing.
    Tick,
    /// Explicit time jump while not playing.
    Seek,
    /// Playback reached its end.
    End,
}

/// Emission rules for one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub send_only_once: bool,
    pub send_on_end: bool,
    pub send_on_seek: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            send_only_once: true,
            send_on_end: true,
            send_on_seek: true,
        }
    }
}

impl From<&DispatchConfig> for DispatchPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            send_only_once: config.send_only_once,
            send_on_end: config.send_on_end,
            send_on_seek: config.send_on_seek,
        }
    }
}

impl DispatchPolicy {
    /// Decide whether to emit for `active`, recording the key when the
    /// once-only rule applies.
    pub fn decide(
        &self,
        trigger: DispatchTrigger,
        active: Option<&Cue>,
        triggered: &mut TriggeredSet,
    ) -> bool {
        match trigger {
            DispatchTrigger::Seek => self.send_on_seek,
            DispatchTrigger::End => self.send_on_end,
            DispatchTrigger::Tick => {
                if !self.send_only_once {
                    return true;
                }
                triggered.insert(CueKey::of(active))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(start: f64, value: Viseme) -> Cue {
        Cue::new(start, start + 0.5, value)
    }

    #[test]
    fn test_tick_dedups_when_send_only_once() {
        let policy = DispatchPolicy::default();
        let mut triggered = TriggeredSet::new();
        let a = cue(0.5, Viseme::A);

        let emitted = (0..50)
            .filter(|_| policy.decide(DispatchTrigger::Tick, Some(&a), &mut triggered))
            .count();
        assert_eq!(emitted, 1);
        assert_eq!(triggered.len(), 1);
    }

    #[test]
    fn test_tick_always_emits_without_send_only_once() {
        let policy = DispatchPolicy {
            send_only_once: false,
            ..DispatchPolicy::default()
        };
        let mut triggered = TriggeredSet::new();
        let a = cue(0.5, Viseme::A);

        for _ in 0..5 {
            assert!(policy.decide(DispatchTrigger::Tick, Some(&a), &mut triggered));
        }
        assert!(triggered.is_empty());
    }

    #[test]
    fn test_key_distinguishes_value_and_start() {
        let policy = DispatchPolicy::default();
        let mut triggered = TriggeredSet::new();

        assert!(policy.decide(DispatchTrigger::Tick, Some(&cue(0.5, Viseme::A)), &mut triggered));
        assert!(policy.decide(DispatchTrigger::Tick, Some(&cue(0.5, Viseme::B)), &mut triggered));
        assert!(policy.decide(DispatchTrigger::Tick, Some(&cue(1.0, Viseme::A)), &mut triggered));
        assert!(policy.decide(DispatchTrigger::Tick, None, &mut triggered));
        assert!(!policy.decide(DispatchTrigger::Tick, None, &mut triggered));
    }

    #[test]
    fn test_seek_ignores_triggered_set() {
        let policy = DispatchPolicy::default();
        let mut triggered = TriggeredSet::new();
        let a = cue(0.5, Viseme::A);

        assert!(policy.decide(DispatchTrigger::Tick, Some(&a), &mut triggered));
        assert!(policy.decide(DispatchTrigger::Seek, Some(&a), &mut triggered));
        assert!(policy.decide(DispatchTrigger::Seek, Some(&a), &mut triggered));
    }

    #[test]
    fn test_seek_disabled() {
        let policy = DispatchPolicy {
            send_on_seek: false,
            ..DispatchPolicy::default()
        };
        assert!(!policy.decide(DispatchTrigger::Seek, None, &mut TriggeredSet::new()));
    }

    #[test]
    fn test_end_is_forced_regardless_of_dedup() {
        let policy = DispatchPolicy::default();
        let mut triggered = TriggeredSet::new();
        let a = cue(1.2, Viseme::B);

        assert!(policy.decide(DispatchTrigger::Tick, Some(&a), &mut triggered));
        assert!(!policy.decide(DispatchTrigger::Tick, Some(&a), &mut triggered));
        assert!(policy.decide(DispatchTrigger::End, Some(&a), &mut triggered));

        let quiet = DispatchPolicy {
            send_on_end: false,
            ..policy
        };
        assert!(!quiet.decide(DispatchTrigger::End, Some(&a), &mut triggered));
    }

    #[test]
    fn test_clear_resets_session() {
        let policy = DispatchPolicy::default();
        let mut triggered = TriggeredSet::new();
        let a = cue(0.0, Viseme::X);

        assert!(policy.decide(DispatchTrigger::Tick, Some(&a), &mut triggered));
        triggered.clear();
        assert!(policy.decide(DispatchTrigger::Tick, Some(&a), &mut triggered));
    }
}

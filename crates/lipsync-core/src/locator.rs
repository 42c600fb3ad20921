//! Cue locator: maps a playback time to the active and nearest cues.
//!
//! Both lookups are binary searches over the sorted starts. Because cues are
//! sorted and non-overlapping, the only candidates for "active" and
//! "nearest" are the last cue starting at or before `t` and the first cue
//! starting after it.

use crate::cue::{Cue, CueSet};

/// Default maximum distance (seconds) between `t` and a cue start for that
/// cue to count as "nearest".
pub const DEFAULT_NEAREST_THRESHOLD_SECS: f64 = 5.0;

/// Result of a cue lookup. `None` plays the role of the empty sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CueMatch {
    /// Cue whose `[start, end)` contains the query time.
    pub active: Option<Cue>,
    /// Cue whose start is closest to the query time, within the threshold.
    pub nearest: Option<Cue>,
}

/// Stateless lookup of cues by time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueLocator {
    threshold: f64,
}

impl Default for CueLocator {
    fn default() -> Self {
        Self::new(DEFAULT_NEAREST_THRESHOLD_SECS)
    }
}

impl CueLocator {
    pub const fn new(threshold_secs: f64) -> Self {
        Self {
            threshold: threshold_secs,
        }
    }

    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the active and nearest cues for time `t`.
    pub fn locate(&self, set: &CueSet, t: f64) -> CueMatch {
        let cues = set.cues();
        if cues.is_empty() || !t.is_finite() {
            return CueMatch::default();
        }

        // Number of cues starting at or before t.
        let split = cues.partition_point(|c| c.start <= t);
        let before = split.checked_sub(1).map(|i| cues[i]);
        let after = cues.get(split).copied();

        let active = before.filter(|c| c.contains(t));

        // Ties go to the earlier cue.
        let nearest = match (before, after) {
            (Some(b), Some(a)) if (a.start - t) < (t - b.start) => Some(a),
            (Some(b), _) => Some(b),
            (None, a) => a,
        }
        .filter(|c| (t - c.start).abs() < self.threshold);

        CueMatch { active, nearest }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viseme::Viseme;

    fn sample() -> CueSet {
        CueSet::new(
            None,
            None,
            vec![
                Cue::new(0.0, 0.5, Viseme::X),
                Cue::new(0.5, 1.2, Viseme::A),
                Cue::new(1.2, 2.0, Viseme::B),
            ],
        )
        .unwrap()
    }

    /// Straight scan with the same rules, used as an oracle.
    fn linear(set: &CueSet, t: f64, threshold: f64) -> CueMatch {
        let mut result = CueMatch::default();
        let mut smallest = f64::INFINITY;
        for cue in set.cues() {
            if cue.contains(t) {
                result.active = Some(*cue);
            }
            let diff = (t - cue.start).abs();
            if diff < smallest && diff < threshold {
                smallest = diff;
                result.nearest = Some(*cue);
            }
        }
        result
    }

    #[test]
    fn test_inside_second_cue() {
        let set = sample();
        let m = CueLocator::default().locate(&set, 0.7);
        let expected = Cue::new(0.5, 1.2, Viseme::A);
        assert_eq!(m.active, Some(expected));
        assert_eq!(m.nearest, Some(expected));
    }

    #[test]
    fn test_empty_set_yields_sentinels() {
        let set = CueSet::empty(None);
        for t in [-1.0, 0.0, 3.3, 1e6] {
            assert_eq!(CueLocator::default().locate(&set, t), CueMatch::default());
        }
    }

    #[test]
    fn test_boundary_belongs_to_next_cue() {
        let set = sample();
        let m = CueLocator::default().locate(&set, 1.2);
        assert_eq!(m.active.map(|c| c.value), Some(Viseme::B));
    }

    #[test]
    fn test_after_last_cue() {
        let set = sample();
        let locator = CueLocator::default();

        let m = locator.locate(&set, 2.5);
        assert_eq!(m.active, None);
        assert_eq!(m.nearest.map(|c| c.value), Some(Viseme::B));

        let m = locator.locate(&set, 10.0);
        assert_eq!(m, CueMatch::default());
    }

    #[test]
    fn test_before_first_cue() {
        let set = CueSet::new(None, None, vec![Cue::new(3.0, 4.0, Viseme::C)]).unwrap();
        let m = CueLocator::default().locate(&set, 0.0);
        assert_eq!(m.active, None);
        assert_eq!(m.nearest.map(|c| c.start), Some(3.0));
    }

    #[test]
    fn test_gap_between_cues() {
        let set = CueSet::new(
            None,
            None,
            vec![Cue::new(0.0, 1.0, Viseme::A), Cue::new(2.0, 3.0, Viseme::B)],
        )
        .unwrap();
        let m = CueLocator::default().locate(&set, 1.8);
        assert_eq!(m.active, None);
        assert_eq!(m.nearest.map(|c| c.value), Some(Viseme::B));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let set = CueSet::new(None, None, vec![Cue::new(0.0, 1.0, Viseme::A)]).unwrap();
        let locator = CueLocator::new(2.0);
        assert!(locator.locate(&set, 1.999).nearest.is_some());
        assert!(locator.locate(&set, 2.0).nearest.is_none());
    }

    #[test]
    fn test_nan_time_yields_sentinels() {
        assert_eq!(
            CueLocator::default().locate(&sample(), f64::NAN),
            CueMatch::default()
        );
    }

    #[test]
    fn test_matches_linear_scan() {
        // Bounds sit on a grid of hundredths so touching cues share the
        // exact same boundary value.
        let grid = |k: u32| f64::from(k) * 0.01;

        let mut cues = Vec::new();
        let mut k = 0;
        for i in 0..200_u32 {
            let gap = if i % 5 == 0 { 40 } else { 0 };
            let len = 5 + (i % 7) * 3;
            let start = k + gap;
            let end = start + len;
            let value = Viseme::from_index(u8::try_from(i % 9).unwrap());
            cues.push(Cue::new(grid(start), grid(end), value));
            k = end;
        }
        let last = grid(k);
        let set = CueSet::new(None, None, cues).unwrap();
        assert_eq!(set.len(), 200);
        let locator = CueLocator::default();

        let mut step = 0;
        loop {
            let q = -6.0 + f64::from(step) * 0.013;
            if q >= last + 6.0 {
                break;
            }
            let fast = locator.locate(&set, q);
            let slow = linear(&set, q, locator.threshold());
            assert_eq!(fast.active, slow.active, "active mismatch at t={q}");
            assert_eq!(
                fast.nearest.map(|c| c.start),
                slow.nearest.map(|c| c.start),
                "nearest mismatch at t={q}"
            );
            assert_eq!(locator.locate(&set, q), fast, "lookup not repeatable at t={q}");
            step += 1;
        }
    }

}

//! Playback clock adapter.
//!
//! The external player owns playback time; the adapter only mirrors it.
//! Reports come in either pushed (`report_position`, `set_status`) or
//! pulled by a sampler task that polls a [`PositionSource`] at a fixed
//! cadence. Readers get the latest value through [`PlaybackClock`] or
//! watch channels.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lipsync_core::{ClockSample, PlaybackClock, PlaybackStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Fastest polling the sampler will do.
pub const MIN_SAMPLE_CADENCE: Duration = Duration::from_millis(1);

/// One reading from the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackReport {
    pub position: f64,
    pub status: PlaybackStatus,
}

/// Something that can be asked for the current playback position.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Current reading, or `None` if the player did not answer.
    async fn poll(&self) -> Option<PlaybackReport>;
}

/// Latest-value mirror of the external player.
#[derive(Debug)]
pub struct PlaybackClockAdapter {
    samples: watch::Sender<ClockSample>,
    status: watch::Sender<PlaybackStatus>,
}

impl Default for PlaybackClockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClockAdapter {
    pub fn new() -> Self {
        let (samples, _) = watch::channel(ClockSample::default());
        let (status, _) = watch::channel(PlaybackStatus::Stopped);
        Self { samples, status }
    }

    /// Record a new position. Every call counts as a fresh sample, even
    /// when the position did not change.
    pub fn report_position(&self, position: f64) {
        if !position.is_finite() {
            debug!(position, "Ignoring non-finite playback position");
            return;
        }
        self.samples.send_modify(|sample| {
            sample.position = position;
            sample.seq = sample.seq.wrapping_add(1);
        });
    }

    pub fn set_status(&self, status: PlaybackStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                debug!(from = ?*current, to = ?status, "Playback status changed");
                *current = status;
                true
            }
        });
    }

    /// Apply one full reading.
    pub fn apply(&self, report: PlaybackReport) {
        self.report_position(report.position);
        self.set_status(report.status);
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_samples(&self) -> watch::Receiver<ClockSample> {
        self.samples.subscribe()
    }

    /// Poll `source` every `cadence` until cancelled.
    ///
    /// A cadence below [`MIN_SAMPLE_CADENCE`], zero included, is raised to it.
    pub fn spawn_sampler(
        self: &Arc<Self>,
        source: Arc<dyn PositionSource>,
        cadence: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let adapter = Arc::clone(self);
        let cadence = cadence.max(MIN_SAMPLE_CADENCE);
        tokio::spawn(async move {
            let mut ticker = interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            debug!(cadence_ms = cadence.as_millis(), "Playback sampler starting");

            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(report) = source.poll().await {
                            trace!(?report, "Playback sample");
                            adapter.apply(report);
                        }
                    }
                }
            }

            debug!("Playback sampler stopped");
        })
    }
}

impl PlaybackClock for PlaybackClockAdapter {
    fn sample(&self) -> ClockSample {
        *self.samples.borrow()
    }

    fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }
}

/// A stand-in player that advances in real time from `start` and reports
/// `Ended` once `duration` is reached.
#[derive(Debug, Clone)]
pub struct WallClockSource {
    origin: Instant,
    start: f64,
    duration: f64,
}

impl WallClockSource {
    pub fn new(start: f64, duration: f64) -> Self {
        Self {
            origin: Instant::now(),
            start: start.max(0.0),
            duration,
        }
    }

    fn position(&self) -> f64 {
        self.start + self.origin.elapsed().as_secs_f64()
    }
}

#[async_trait]
impl PositionSource for WallClockSource {
    async fn poll(&self) -> Option<PlaybackReport> {
        let position = self.position();
        let report = if position >= self.duration {
            PlaybackReport {
                position: self.duration,
                status: PlaybackStatus::Ended,
            }
        } else {
            PlaybackReport {
                position,
                status: PlaybackStatus::Playing,
            }
        };
        Some(report)
    }
}

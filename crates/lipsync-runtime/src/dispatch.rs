//! The dispatch loop.
//!
//! A [`DispatchSession`] binds one cue set to a set of sinks. While the
//! player reports `playing`, [`DispatchSession::run`] ticks at a fixed
//! quantum, locates the cue for the current time, applies the emission
//! policy and fans the event out to every sink. Sinks only enqueue, so a
//! slow or disconnected sink never holds up a tick.
//!
//! Time inside the loop is virtual: it advances by one quantum per tick and
//! snaps to the player's position whenever the clock reports a fresh
//! sample. The player usually reports far less often than the loop ticks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lipsync_core::{
    ConfigError, CueLocator, CueMatch, CueSet, CueSink, DispatchConfig, DispatchEvent,
    DispatchPolicy, DispatchTrigger, EmittedEvent, PlaybackClock, PlaybackStatus, TriggeredSet,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::broadcaster::DispatchEventBroadcaster;
use crate::clock::PlaybackClockAdapter;

/// Outcome of one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    /// Loop iterations that looked up a cue.
    pub ticks: u64,
    /// Events handed to the sinks, including the final one.
    pub emitted: u64,
    /// The loop stopped because of cancellation rather than playback.
    pub cancelled: bool,
    /// Player status when the loop exited.
    pub final_status: PlaybackStatus,
}

/// Totals across every session driven by [`DispatchSession::drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveSummary {
    pub sessions: u64,
    pub emitted: u64,
    pub seeks: u64,
}

/// Cue set, policy and sinks for one audio source.
pub struct DispatchSession {
    cues: Arc<CueSet>,
    locator: CueLocator,
    policy: DispatchPolicy,
    tick: Duration,
    sinks: Vec<Arc<dyn CueSink>>,
    events: DispatchEventBroadcaster,
}

impl DispatchSession {
    pub fn new(cues: Arc<CueSet>, config: &DispatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            cues,
            locator: CueLocator::new(config.nearest_threshold),
            policy: DispatchPolicy::from(config),
            tick: config.tick,
            sinks: Vec::new(),
            events: DispatchEventBroadcaster::new(),
        })
    }

    /// Register a sink. Sinks receive events in registration order.
    pub fn add_sink(&mut self, sink: Arc<dyn CueSink>) {
        debug!(sink = sink.name(), "Registered sink");
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn CueSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn cues(&self) -> &CueSet {
        &self.cues
    }

    pub const fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Observe every emission of this session.
    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.events.subscribe()
    }

    /// Send each sink's init message, with the cue document if asked.
    pub fn announce(&self, include_cues: bool) {
        let cues = include_cues.then_some(self.cues.as_ref());
        for sink in &self.sinks {
            sink.announce(cues);
        }
    }

    pub fn locate(&self, t: f64) -> CueMatch {
        self.locator.locate(&self.cues, t)
    }

    /// Handle an explicit time jump while not playing.
    ///
    /// Returns whether an event was emitted. Seeks are never deduplicated.
    pub fn seek(&self, t: f64) -> bool {
        let found = self.locate(t);
        let mut unused = TriggeredSet::new();
        if self
            .policy
            .decide(DispatchTrigger::Seek, found.active.as_ref(), &mut unused)
        {
            self.emit(DispatchTrigger::Seek, DispatchEvent::new(t, found));
            true
        } else {
            false
        }
    }

    /// Run one playback session until the clock stops reporting `playing`
    /// or `cancel_token` fires.
    ///
    /// The once-only memory starts empty for every call. If the session
    /// ends with `Ended`, one last event is emitted for the terminal time
    /// when the policy asks for it.
    pub async fn run(
        &self,
        clock: &dyn PlaybackClock,
        cancel_token: &CancellationToken,
    ) -> DispatchReport {
        let mut triggered = TriggeredSet::new();
        let mut report = DispatchReport::default();

        let step = self.tick.as_secs_f64();
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let first = clock.sample();
        let mut last_seq = first.seq;
        let mut virtual_time = first.position;
        let mut last_time = first.position;

        info!(
            start = virtual_time,
            cues = self.cues.len(),
            sinks = self.sinks.len(),
            "Dispatch loop starting"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                _ = ticker.tick() => {}
            }

            let status = clock.status();
            if !status.is_playing() {
                report.final_status = status;
                break;
            }

            let sample = clock.sample();
            if sample.seq != last_seq {
                last_seq = sample.seq;
                virtual_time = sample.position;
            }

            report.ticks += 1;
            let found = self.locate(virtual_time);
            if self
                .policy
                .decide(DispatchTrigger::Tick, found.active.as_ref(), &mut triggered)
            {
                self.emit(DispatchTrigger::Tick, DispatchEvent::new(virtual_time, found));
                report.emitted += 1;
            }

            last_time = virtual_time;
            virtual_time += step;
        }

        if report.cancelled {
            report.final_status = clock.status();
        } else if report.final_status == PlaybackStatus::Ended {
            // The terminal emission repeats the last processed time, so it
            // carries the last active cue rather than the track end.
            let end_time = if report.ticks > 0 {
                last_time
            } else {
                clock.sample().position
            };
            let found = self.locate(end_time);
            if self
                .policy
                .decide(DispatchTrigger::End, found.active.as_ref(), &mut triggered)
            {
                self.emit(DispatchTrigger::End, DispatchEvent::new(end_time, found));
                report.emitted += 1;
            }
        }

        info!(
            ticks = report.ticks,
            emitted = report.emitted,
            cancelled = report.cancelled,
            status = ?report.final_status,
            "Dispatch loop finished"
        );
        report
    }

    /// Run [`run`](Self::run) on its own task.
    pub fn spawn(
        self: Arc<Self>,
        clock: Arc<dyn PlaybackClock>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<DispatchReport> {
        tokio::spawn(async move { self.run(clock.as_ref(), &cancel_token).await })
    }

    /// Follow the player until cancelled.
    ///
    /// Starts a session each time the status turns `playing`. While not
    /// playing, a reported position that differs from the last one is
    /// treated as a seek.
    pub async fn drive(
        &self,
        clock: &PlaybackClockAdapter,
        cancel_token: &CancellationToken,
    ) -> DriveSummary {
        let mut summary = DriveSummary::default();
        let mut status_rx = clock.subscribe_status();
        let mut sample_rx = clock.subscribe_samples();
        let mut last_position = sample_rx.borrow_and_update().position;

        loop {
            let status = *status_rx.borrow_and_update();
            if status.is_playing() {
                let report = self.run(clock, cancel_token).await;
                summary.sessions += 1;
                summary.emitted += report.emitted;
                if report.cancelled {
                    break;
                }
                // Positions seen during playback are not seeks.
                last_position = sample_rx.borrow_and_update().position;
                continue;
            }

            tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = sample_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let position = sample_rx.borrow_and_update().position;
                    let moved = (position - last_position).abs() > f64::EPSILON;
                    last_position = position;
                    if moved && !status_rx.borrow().is_playing() && self.seek(position) {
                        summary.seeks += 1;
                        summary.emitted += 1;
                    }
                }
            }
        }

        debug!(?summary, "Dispatch driver stopped");
        summary
    }

    fn emit(&self, trigger: DispatchTrigger, event: DispatchEvent) {
        debug!(
            ?trigger,
            time = event.time,
            active = ?event.active_value(),
            next = ?event.next_value(),
            "Dispatching cue"
        );
        for sink in &self.sinks {
            sink.dispatch(&event);
        }
        self.events.broadcast(EmittedEvent { trigger, event });
    }
}

impl fmt::Debug for DispatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchSession")
            .field("cues", &self.cues.len())
            .field("policy", &self.policy)
            .field("tick", &self.tick)
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipsync_core::{ClockSample, Cue, Viseme};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Sink that remembers what it was given.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<DispatchEvent>>,
        announced: Mutex<Vec<bool>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<DispatchEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl CueSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn dispatch(&self, event: &DispatchEvent) {
            self.events.lock().unwrap().push(*event);
        }

        fn announce(&self, cues: Option<&CueSet>) {
            self.announced.lock().unwrap().push(cues.is_some());
        }
    }

    fn sample_cues() -> Arc<CueSet> {
        Arc::new(
            CueSet::new(
                None,
                None,
                vec![
                    Cue::new(0.0, 0.5, Viseme::X),
                    Cue::new(0.5, 1.2, Viseme::A),
                    Cue::new(1.2, 2.0, Viseme::B),
                ],
            )
            .unwrap(),
        )
    }

    fn session(config: &DispatchConfig) -> (DispatchSession, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let session = DispatchSession::new(sample_cues(), config)
            .unwrap()
            .with_sink(sink.clone());
        (session, sink)
    }

    #[test]
    fn test_new_rejects_zero_tick() {
        let config = DispatchConfig {
            tick: Duration::ZERO,
            ..DispatchConfig::default()
        };
        assert!(DispatchSession::new(sample_cues(), &config).is_err());
    }

    #[test]
    fn test_seek_always_emits_when_enabled() {
        let (session, sink) = session(&DispatchConfig::default());

        assert!(session.seek(0.7));
        assert!(session.seek(0.7));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].active_value(), Some(Viseme::A));
    }

    #[test]
    fn test_seek_disabled() {
        let config = DispatchConfig {
            send_on_seek: false,
            ..DispatchConfig::default()
        };
        let (session, sink) = session(&config);
        assert!(!session.seek(0.7));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_announce_reaches_every_sink() {
        let (session, sink) = session(&DispatchConfig::default());
        session.announce(true);
        session.announce(false);
        assert_eq!(*sink.announced.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let (session, sink) = session(&DispatchConfig::default());
        let clock = PlaybackClockAdapter::new();
        clock.set_status(PlaybackStatus::Playing);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = session.run(&clock, &cancel).await;

        assert!(report.cancelled);
        assert_eq!(report.ticks, 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_playing_exits_without_emitting() {
        let (session, sink) = session(&DispatchConfig::default());
        let clock = PlaybackClockAdapter::new();

        let report = session.run(&clock, &CancellationToken::new()).await;

        assert_eq!(report.final_status, PlaybackStatus::Stopped);
        assert_eq!(report.emitted, 0);
        assert!(sink.events().is_empty());
    }

    /// Clock frozen at one sample that reports `playing` for a fixed
    /// number of status checks.
    struct FrozenClock {
        sample: ClockSample,
        playing_checks: u32,
        checks: AtomicU32,
    }

    impl PlaybackClock for FrozenClock {
        fn sample(&self) -> ClockSample {
            self.sample
        }

        fn status(&self) -> PlaybackStatus {
            if self.checks.fetch_add(1, Ordering::SeqCst) < self.playing_checks {
                PlaybackStatus::Playing
            } else {
                PlaybackStatus::Paused
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_cue_emits_once() {
        let (session, sink) = session(&DispatchConfig::default());
        let clock = FrozenClock {
            sample: ClockSample {
                position: 0.7,
                seq: 1,
            },
            playing_checks: 20,
            checks: AtomicU32::new(0),
        };

        let report = session.run(&clock, &CancellationToken::new()).await;

        assert_eq!(report.final_status, PlaybackStatus::Paused);
        assert_eq!(report.ticks, 20);
        // Virtual time walks 0.70..0.89: still inside cue A.
        assert_eq!(report.emitted, 1);
        assert_eq!(sink.events()[0].active_value(), Some(Viseme::A));
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_once_rule_every_tick_emits() {
        let config = DispatchConfig {
            send_only_once: false,
            ..DispatchConfig::default()
        };
        let (session, sink) = session(&config);
        let clock = FrozenClock {
            sample: ClockSample {
                position: 0.7,
                seq: 1,
            },
            playing_checks: 5,
            checks: AtomicU32::new(0),
        };

        let report = session.run(&clock, &CancellationToken::new()).await;

        assert_eq!(report.emitted, 5);
        assert_eq!(sink.events().len(), 5);
    }
}

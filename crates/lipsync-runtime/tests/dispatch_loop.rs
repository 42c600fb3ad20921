//! Integration tests for the dispatch loop driven by the playback clock
//! adapter.
//!
//! Uses a paused Tokio clock so every tick is deterministic, and a
//! recording sink in place of the network.
//!
//! # What is tested
//!
//! - A position change while stopped is dispatched as a seek
//! - Playing through a track emits each cue once, plus one terminal event
//! - A second play session starts with a fresh once-only memory
//! - Cancelling the driver while playing ends it promptly

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lipsync_core::{
    Cue, CueSet, CueSink, DispatchConfig, DispatchEvent, DispatchTrigger, EmittedEvent,
    PlaybackStatus, Viseme,
};
use lipsync_runtime::{DispatchSession, PlaybackClockAdapter};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

// ── Fixtures ───────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<DispatchEvent>>,
}

impl RecordingSink {
    fn values(&self) -> Vec<Option<Viseme>> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(DispatchEvent::active_value)
            .collect()
    }
}

impl CueSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn dispatch(&self, event: &DispatchEvent) {
        self.events.lock().unwrap().push(*event);
    }

    fn announce(&self, _cues: Option<&CueSet>) {}
}

fn cues() -> Arc<CueSet> {
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

struct Harness {
    session: Arc<DispatchSession>,
    sink: Arc<RecordingSink>,
    clock: Arc<PlaybackClockAdapter>,
    events: broadcast::Receiver<EmittedEvent>,
}

fn harness() -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let session = DispatchSession::new(cues(), &DispatchConfig::default())
        .unwrap()
        .with_sink(sink.clone());
    let events = session.subscribe();
    Harness {
        session: Arc::new(session),
        sink,
        clock: Arc::new(PlaybackClockAdapter::new()),
        events,
    }
}

fn triggers(events: &mut broadcast::Receiver<EmittedEvent>) -> Vec<DispatchTrigger> {
    let mut seen = Vec::new();
    while let Ok(emitted) = events.try_recv() {
        seen.push(emitted.trigger);
    }
    seen
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_seek_then_play_through() {
    let Harness {
        session,
        sink,
        clock,
        mut events,
    } = harness();
    let cancel = CancellationToken::new();

    let driver = {
        let session = Arc::clone(&session);
        let clock = Arc::clone(&clock);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.drive(&clock, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Scrubbing while stopped.
    clock.report_position(1.5);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.values(), vec![Some(Viseme::B)]);

    // Play from the top through the end of the last cue.
    clock.set_status(PlaybackStatus::Playing);
    clock.report_position(0.0);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    clock.set_status(PlaybackStatus::Ended);
    tokio::time::sleep(Duration::from_millis(100)).await;

    cancel.cancel();
    let summary = driver.await.unwrap();

    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.seeks, 1);
    assert_eq!(
        sink.values(),
        vec![
            Some(Viseme::B),
            Some(Viseme::X),
            Some(Viseme::A),
            Some(Viseme::B),
            None,
            None,
        ]
    );
    assert_eq!(summary.emitted, 6);

    let seen = triggers(&mut events);
    assert_eq!(seen.first(), Some(&DispatchTrigger::Seek));
    assert_eq!(seen.last(), Some(&DispatchTrigger::End));
}

#[tokio::test(start_paused = true)]
async fn test_each_session_has_fresh_memory() {
    let Harness {
        session,
        sink,
        clock,
        ..
    } = harness();
    let cancel = CancellationToken::new();

    let driver = {
        let session = Arc::clone(&session);
        let clock = Arc::clone(&clock);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.drive(&clock, &cancel).await })
    };

    for _ in 0..2 {
        clock.set_status(PlaybackStatus::Playing);
        clock.report_position(0.6);
        tokio::time::sleep(Duration::from_millis(200)).await;
        clock.set_status(PlaybackStatus::Paused);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    cancel.cancel();
    let summary = driver.await.unwrap();

    // One tick emission per session, no terminal event on pause.
    assert_eq!(summary.sessions, 2);
    assert_eq!(sink.values(), vec![Some(Viseme::A), Some(Viseme::A)]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_playing() {
    let Harness {
        session, clock, ..
    } = harness();
    let cancel = CancellationToken::new();

    clock.set_status(PlaybackStatus::Playing);
    let driver = {
        let session = Arc::clone(&session);
        let clock = Arc::clone(&clock);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.drive(&clock, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    cancel.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(1), driver)
        .await
        .expect("driver should stop after cancellation")
        .unwrap();
    assert_eq!(summary.sessions, 1);
}

//! Dispatch event broadcasting for observers of a session.
//!
//! A UI follows the active cue by subscribing here instead of registering
//! as a sink. Each session owns its own broadcaster.

use lipsync_core::EmittedEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Events a slow observer may fall behind by before it lags.
const CHANNEL_CAPACITY: usize = 64;

/// Fan-out of emitted events to any number of observers.
#[derive(Debug, Clone)]
pub struct DispatchEventBroadcaster {
    sender: broadcast::Sender<EmittedEvent>,
}

impl DispatchEventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish `event`. A no-op while nobody is subscribed.
    pub fn broadcast(&self, event: EmittedEvent) {
        if self.sender.receiver_count() == 0 {
            return;
        }
        trace!(trigger = ?event.trigger, time = event.event.time, "Publishing emitted event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.sender.subscribe()
    }

    /// Observers currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DispatchEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipsync_core::{CueMatch, DispatchEvent, DispatchTrigger};

    fn event(time: f64) -> EmittedEvent {
        EmittedEvent {
            trigger: DispatchTrigger::Tick,
            event: DispatchEvent::new(time, CueMatch::default()),
        }
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let broadcaster = DispatchEventBroadcaster::new();
        broadcaster.broadcast(event(0.0));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribers_receive_events_in_order() {
        let broadcaster = DispatchEventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.broadcast(event(0.1));
        broadcaster.broadcast(event(0.2));

        assert!((rx.try_recv().unwrap().event.time - 0.1).abs() < 1e-9);
        assert!((rx.try_recv().unwrap().event.time - 0.2).abs() < 1e-9);
        assert!(rx.try_recv().is_err());
    }
}

//! Connection state and outbound queue shared between the stream sink and
//! its worker.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lipsync_core::ActionMessage;
use serde_json::Value;
use tokio::sync::{Notify, watch};
use tracing::debug;

/// Connection state of a [`StreamSink`](super::StreamSink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the retry interval before the next attempt.
    Retrying,
    /// Unexpected failure; the worker falls back to `Disconnected`.
    Error,
    /// Stopped by the owner. Only `start()` leaves this state.
    Stopped,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Retrying => "retrying",
            Self::Error => "error",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// A queued outbound payload. JSON values are serialized when written.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Json(Value),
}

impl OutboundMessage {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for OutboundMessage {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<ActionMessage> for OutboundMessage {
    fn from(message: ActionMessage) -> Self {
        Self::Text(message.to_text())
    }
}

/// Why a message was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejected {
    NotConnected(StreamState),
    QueueFull,
}

#[derive(Debug, Default)]
struct Inner {
    state: StreamState,
    queue: VecDeque<OutboundMessage>,
}

/// State and queue behind one mutex, so "enqueue only while connected" and
/// "clear on leaving connected" cannot interleave.
#[derive(Debug)]
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    capacity: usize,
    pending: Notify,
    state_tx: watch::Sender<StreamState>,
}

impl Shared {
    pub(crate) fn new(capacity: usize) -> Self {
        let (state_tx, _) = watch::channel(StreamState::Disconnected);
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
            pending: Notify::new(),
            state_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> StreamState {
        self.lock().state
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    /// Move to `next`. Refused once stopped.
    pub(crate) fn transition(&self, next: StreamState) -> bool {
        let mut inner = self.lock();
        if inner.state == StreamState::Stopped {
            return false;
        }
        self.apply(&mut inner, next);
        true
    }

    /// Enter `Stopped` and drop everything pending.
    pub(crate) fn stop(&self) {
        let mut inner = self.lock();
        self.apply(&mut inner, StreamState::Stopped);
        inner.queue.clear();
    }

    /// Leave `Stopped` so a new worker can run.
    pub(crate) fn reset(&self) {
        let mut inner = self.lock();
        if inner.state == StreamState::Stopped {
            self.apply(&mut inner, StreamState::Disconnected);
        }
    }

    fn apply(&self, inner: &mut Inner, next: StreamState) {
        let previous = inner.state;
        if previous == next {
            return;
        }
        if previous == StreamState::Connected && !inner.queue.is_empty() {
            debug!(
                dropped = inner.queue.len(),
                "Clearing outbound queue on disconnect"
            );
            inner.queue.clear();
        }
        inner.state = next;
        self.state_tx.send_replace(next);
        debug!(from = %previous, to = %next, "Stream state changed");
    }

    pub(crate) fn enqueue(&self, message: OutboundMessage) -> Result<(), Rejected> {
        {
            let mut inner = self.lock();
            if inner.state != StreamState::Connected {
                return Err(Rejected::NotConnected(inner.state));
            }
            if inner.queue.len() >= self.capacity {
                return Err(Rejected::QueueFull);
            }
            inner.queue.push_back(message);
        }
        self.pending.notify_one();
        Ok(())
    }

    /// Next message to write; nothing once the connection is gone.
    pub(crate) fn pop(&self) -> Option<OutboundMessage> {
        let mut inner = self.lock();
        if inner.state != StreamState::Connected {
            return None;
        }
        inner.queue.pop_front()
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Resolves after the next enqueue (or immediately if one happened
    /// since the last wait).
    pub(crate) async fn wait_pending(&self) {
        self.pending.notified().await;
    }
}

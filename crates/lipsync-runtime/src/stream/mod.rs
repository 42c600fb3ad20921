//! Reconnecting WebSocket sink.
//!
//! [`StreamSink`] owns a connection worker that walks the
//! `disconnected → connecting → connected → retrying` cycle. Messages are
//! only accepted while connected; anything sent in another state is
//! dropped with a warning, and the queue is cleared whenever the
//! connection goes away. Delivery is at most once.
//!
//! # Example
//!
//! ```ignore
//! let sink = StreamSink::new(StreamSinkConfig::default())?;
//! sink.start();
//! sink.send(ActionMessage::init_automation());
//! sink.stop().await;
//! ```

mod connection;
mod state;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lipsync_core::{ActionMessage, CueSet, CueSink, DispatchEvent, StreamSinkConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use state::{OutboundMessage, StreamState};

use crate::error::SinkError;
use state::{Rejected, Shared};

/// Handle to a running connection worker.
struct WorkerHandle {
    cancel_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

/// Connection-oriented sink with its own send queue.
pub struct StreamSink {
    config: StreamSinkConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl StreamSink {
    /// Build a sink in the `disconnected` state. Nothing connects until
    /// [`start`](Self::start).
    pub fn new(config: StreamSinkConfig) -> Result<Self, SinkError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new(config.queue_capacity)),
            config,
            worker: Mutex::new(None),
        })
    }

    /// Spawn the connection worker and return immediately.
    ///
    /// Idempotent while a worker is alive. After `stop()` or after the
    /// worker gave up, calling it again starts a fresh retry cycle.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut guard = self.worker.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = guard.as_ref() {
            if !handle.join_handle.is_finished() {
                debug!("Stream worker already running");
                return;
            }
        }

        self.shared.reset();

        let cancel_token = CancellationToken::new();
        let join_handle = tokio::spawn(connection::run(
            self.config.clone(),
            Arc::clone(&self.shared),
            cancel_token.clone(),
        ));

        info!(url = %self.config.url(), "Stream sink started");

        *guard = Some(WorkerHandle {
            cancel_token,
            join_handle,
        });
    }

    /// Queue a message for the current connection.
    ///
    /// Returns `false` when it was dropped: not connected, or the queue is
    /// full.
    pub fn send(&self, message: impl Into<OutboundMessage>) -> bool {
        match self.shared.enqueue(message.into()) {
            Ok(()) => true,
            Err(Rejected::NotConnected(state)) => {
                warn!(%state, "Stream not connected; dropping message");
                false
            }
            Err(Rejected::QueueFull) => {
                warn!(
                    capacity = self.config.queue_capacity,
                    "Stream queue full; dropping message"
                );
                false
            }
        }
    }

    /// Enter `stopped`, discard the queue and close the connection.
    ///
    /// Waits up to the configured stop timeout for the worker, then aborts
    /// it. Safe to call more than once and concurrently with `send`.
    pub async fn stop(&self) {
        self.shared.stop();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        handle.cancel_token.cancel();
        let mut join = handle.join_handle;

        match tokio::time::timeout(self.config.stop_timeout, &mut join).await {
            Ok(Ok(())) => info!("Stream sink stopped"),
            Ok(Err(e)) => warn!("Stream worker panicked: {e}"),
            Err(_) => {
                warn!("Stream sink stop timed out; aborting worker");
                join.abort();
            }
        }
    }

    pub fn status(&self) -> StreamState {
        self.shared.state()
    }

    /// Wait up to `within` for the connection to come up.
    pub async fn wait_connected(&self, within: Duration) -> bool {
        let mut states = self.subscribe();
        tokio::time::timeout(within, states.wait_for(|s| *s == StreamState::Connected))
            .await
            .is_ok_and(|state| state.is_ok())
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.shared.subscribe()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue_len()
    }

    pub const fn config(&self) -> &StreamSinkConfig {
        &self.config
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("url", &self.config.url())
            .field("state", &self.status())
            .finish_non_exhaustive()
    }
}

impl CueSink for StreamSink {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn dispatch(&self, event: &DispatchEvent) {
        self.send(ActionMessage::cast_image(event, &self.config.cast));
    }

    fn announce(&self, cues: Option<&CueSet>) {
        self.send(ActionMessage::init_stream(cues));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipsync_core::{ConfigError, CueMatch};

    /// A config pointing at a port nothing listens on.
    fn unreachable_config() -> StreamSinkConfig {
        StreamSinkConfig {
            port: 9,
            retry_interval: Duration::from_millis(20),
            max_retry_time: Duration::from_millis(200),
            stop_timeout: Duration::from_millis(500),
            ..StreamSinkConfig::default()
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = StreamSinkConfig {
            queue_capacity: 0,
            ..StreamSinkConfig::default()
        };
        assert!(matches!(
            StreamSink::new(config),
            Err(SinkError::Config(ConfigError::ZeroQueueCapacity))
        ));
    }

    #[test]
    fn test_send_before_start_is_dropped() {
        let sink = StreamSink::new(StreamSinkConfig::default()).unwrap();
        assert_eq!(sink.status(), StreamState::Disconnected);
        assert!(!sink.send("hello"));
        sink.dispatch(&DispatchEvent::new(0.0, CueMatch::default()));
        assert_eq!(sink.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let sink = StreamSink::new(StreamSinkConfig::default()).unwrap();
        sink.stop().await;
        assert_eq!(sink.status(), StreamState::Stopped);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_window() {
        let sink = StreamSink::new(unreachable_config()).unwrap();
        let mut states = sink.subscribe();
        sink.start();

        tokio::time::timeout(Duration::from_secs(5), async {
            states
                .wait_for(|s| *s != StreamState::Disconnected)
                .await
                .unwrap();
            states
                .wait_for(|s| *s == StreamState::Disconnected)
                .await
                .unwrap();
        })
        .await
        .expect("worker should give up");

        assert!(!sink.send("late"));
        sink.stop().await;
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_final() {
        let sink = StreamSink::new(StreamSinkConfig {
            max_retry_time: Duration::from_secs(30),
            ..unreachable_config()
        })
        .unwrap();
        sink.start();
        sink.start();

        sink.stop().await;
        sink.stop().await;

        assert_eq!(sink.status(), StreamState::Stopped);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.status(), StreamState::Stopped);
    }
}

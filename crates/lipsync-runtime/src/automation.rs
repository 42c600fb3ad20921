//! Control link to the automation host.
//!
//! The host gets no cue events. It only learns that lipsync is present
//! through an `init_cha` greeting, sent each time the link comes up.

use std::time::Duration;

use lipsync_core::{ActionMessage, StreamSinkConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SinkError;
use crate::stream::{StreamSink, StreamState};

/// WebSocket link that greets the automation host on every (re)connect.
#[derive(Debug)]
pub struct AutomationLink {
    stream: std::sync::Arc<StreamSink>,
    greeter: std::sync::Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl AutomationLink {
    pub fn new(config: StreamSinkConfig) -> Result<Self, SinkError> {
        Ok(Self {
            stream: std::sync::Arc::new(StreamSink::new(config)?),
            greeter: std::sync::Mutex::new(None),
        })
    }

    /// Start connecting and greet the host whenever the state reaches
    /// `connected`. Idempotent while running.
    pub fn start(&self) {
        let mut guard = self
            .greeter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.as_ref().is_some_and(|(_, handle)| !handle.is_finished()) {
            return;
        }

        self.stream.start();

        let cancel_token = CancellationToken::new();
        let stream = std::sync::Arc::clone(&self.stream);
        let mut states = stream.subscribe();
        let cancel = cancel_token.clone();
        let handle = tokio::spawn(async move {
            loop {
                if *states.borrow_and_update() == StreamState::Connected {
                    info!(url = %stream.config().url(), "Greeting automation host");
                    stream.send(ActionMessage::init_automation());
                }
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Automation greeter stopped");
        });

        *guard = Some((cancel_token, handle));
    }

    /// Wait up to `within` for the link to come up.
    pub async fn wait_connected(&self, within: Duration) -> bool {
        self.stream.wait_connected(within).await
    }

    pub fn status(&self) -> StreamState {
        self.stream.status()
    }

    /// Stop greeting and close the link.
    pub async fn stop(&self) {
        let greeter = self
            .greeter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some((cancel_token, handle)) = greeter {
            cancel_token.cancel();
            let _ = handle.await;
        }
        self.stream.stop().await;
    }

    pub fn config(&self) -> &StreamSinkConfig {
        self.stream.config()
    }
}

//! OSC-over-UDP sink.
//!
//! Messages are queued by [`DatagramSink::send`] and written by a single
//! background worker, one datagram per message, with a short pause after
//! each write. Nothing is retried: a message that fails to encode or send
//! is logged and discarded.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use lipsync_core::{
    ActionMessage, CueSet, CueSink, DatagramSinkConfig, DispatchEvent, NONE_FIELD,
};
use rosc::{OscMessage, OscPacket};
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use rosc::OscType;

use crate::error::SinkError;

/// Bounded wait for the worker when stopping.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of the datagram worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramStatus {
    Running,
    Stopped,
}

impl fmt::Display for DatagramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Fire-and-forget OSC sender.
pub struct DatagramSink {
    config: DatagramSinkConfig,
    cue_address: String,
    sender: mpsc::Sender<OscMessage>,
    cancel_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DatagramSink {
    /// Bind a local socket and start the worker.
    ///
    /// The target host is resolved lazily by the worker, so an unreachable
    /// target does not fail construction.
    pub async fn start(config: DatagramSinkConfig) -> Result<Self, SinkError> {
        config.validate()?;

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(SinkError::Bind)?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let cancel_token = CancellationToken::new();

        let worker = Worker {
            socket,
            host: config.host.clone(),
            port: config.port,
            pace: config.pace,
            target: None,
        };
        let join_handle = tokio::spawn(worker.run(receiver, cancel_token.clone()));

        info!(
            host = %config.host,
            port = config.port,
            address = %config.address,
            "Datagram sink started"
        );

        Ok(Self {
            cue_address: config.cue_address(),
            config,
            sender,
            cancel_token,
            worker: Mutex::new(Some(join_handle)),
        })
    }

    /// Queue one message for transmission.
    ///
    /// Returns `false` when the message was dropped because the queue is
    /// full or the sink is stopped.
    pub fn send(&self, address: impl Into<String>, args: Vec<OscType>) -> bool {
        let message = OscMessage {
            addr: address.into(),
            args,
        };
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(address = %message.addr, "Datagram queue full; dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!(address = %message.addr, "Datagram sink stopped; dropping message");
                false
            }
        }
    }

    /// Stop the worker. Pending messages are discarded.
    ///
    /// Idempotent. Waits a bounded time for the worker, then aborts it.
    pub async fn stop(&self) {
        self.cancel_token.cancel();

        let Some(mut join) = self.worker.lock().await.take() else {
            return;
        };

        match tokio::time::timeout(STOP_TIMEOUT, &mut join).await {
            Ok(Ok(())) => info!("Datagram sink stopped"),
            Ok(Err(e)) => warn!("Datagram worker panicked: {e}"),
            Err(_) => {
                warn!("Datagram sink stop timed out; aborting worker");
                join.abort();
            }
        }
    }

    pub fn status(&self) -> DatagramStatus {
        if self.cancel_token.is_cancelled() || self.sender.is_closed() {
            DatagramStatus::Stopped
        } else {
            DatagramStatus::Running
        }
    }

    pub const fn config(&self) -> &DatagramSinkConfig {
        &self.config
    }
}

impl fmt::Debug for DatagramSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatagramSink")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl CueSink for DatagramSink {
    fn name(&self) -> &'static str {
        "datagram"
    }

    fn dispatch(&self, event: &DispatchEvent) {
        self.send(self.cue_address.clone(), cue_event_args(event));
    }

    fn announce(&self, cues: Option<&CueSet>) {
        let text = ActionMessage::init_datagram(cues).to_text();
        self.send(self.config.address.clone(), vec![OscType::String(text)]);
    }
}

/// Argument list of a cue message:
/// `[time, activeValue, nextStart, nextEnd, nextValue]`.
///
/// Time is text with three decimals. Missing fields are sent as the
/// string `"None"`.
#[allow(clippy::cast_possible_truncation)]
pub fn cue_event_args(event: &DispatchEvent) -> Vec<OscType> {
    let text_or_none = |value: Option<String>| {
        OscType::String(value.unwrap_or_else(|| NONE_FIELD.to_string()))
    };
    let float_or_none = |value: Option<f64>| {
        value.map_or_else(
            || OscType::String(NONE_FIELD.to_string()),
            |v| OscType::Float(v as f32),
        )
    };

    vec![
        OscType::String(event.time_text()),
        text_or_none(event.active_value().map(|v| v.to_string())),
        float_or_none(event.next_start()),
        float_or_none(event.next_end()),
        text_or_none(event.next_value().map(|v| v.to_string())),
    ]
}

struct Worker {
    socket: UdpSocket,
    host: String,
    port: u16,
    pace: Duration,
    target: Option<SocketAddr>,
}

impl Worker {
    async fn run(mut self, mut receiver: mpsc::Receiver<OscMessage>, cancel: CancellationToken) {
        debug!("Datagram worker starting");

        loop {
            let message = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(message) => message,
                    None => break,
                },
            };

            // A stop requested while waiting wins over the pending message.
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.transmit(&message).await {
                warn!(address = %message.addr, "Failed to send datagram: {e}");
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.pace) => {}
            }
        }

        receiver.close();
        debug!("Datagram worker exited");
    }

    async fn transmit(&mut self, message: &OscMessage) -> io::Result<()> {
        let bytes = rosc::encoder::encode(&OscPacket::Message(message.clone()))
            .map_err(|e| io::Error::other(format!("OSC encoding failed: {e:?}")))?;

        let target = self.resolve().await?;
        if let Err(e) = self.socket.send_to(&bytes, target).await {
            // Re-resolve next time in case the host moved.
            self.target = None;
            return Err(e);
        }
        Ok(())
    }

    async fn resolve(&mut self) -> io::Result<SocketAddr> {
        if let Some(target) = self.target {
            return Ok(target);
        }
        let target = lookup_host((self.host.as_str(), self.port))
            .await?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("No IPv4 address for {}", self.host),
                )
            })?;
        debug!(%target, "Resolved datagram target");
        self.target = Some(target);
        Ok(target)
    }
}

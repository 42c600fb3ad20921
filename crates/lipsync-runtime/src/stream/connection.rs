//! The connection-owning worker of the stream sink.
//!
//! One task connects and reconnects. While connected it runs three
//! activities side by side: an inbound drain, an outbound drain and a
//! queue-depth monitor. Any of them ending tears the connection down.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use lipsync_core::StreamSinkConfig;
use tokio::net::TcpStream;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::state::{Shared, StreamState};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect, serve and reconnect until cancelled, the retry window runs out
/// or an unexpected error occurs.
pub(super) async fn run(config: StreamSinkConfig, shared: Arc<Shared>, cancel: CancellationToken) {
    let url = config.url();
    let mut window_start = Instant::now();

    debug!(%url, "Stream worker starting");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let elapsed = window_start.elapsed();
        if elapsed >= config.max_retry_time {
            warn!(
                %url,
                window_secs = config.max_retry_time.as_secs_f64(),
                "Giving up on connection after retry window"
            );
            shared.transition(StreamState::Disconnected);
            break;
        }
        let remaining = config.max_retry_time - elapsed;

        if !shared.transition(StreamState::Connecting) {
            break;
        }

        let attempt = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            attempt = tokio::time::timeout(remaining, connect_async(url.as_str())) => attempt,
        };

        match attempt {
            Ok(Ok((socket, _response))) => {
                info!(%url, "Stream connected");
                if !shared.transition(StreamState::Connected) {
                    break;
                }
                serve(socket, &config, &shared, &cancel).await;
                if cancel.is_cancelled() {
                    break;
                }
                info!(%url, "Stream connection lost; reconnecting");
                window_start = Instant::now();
            }
            Ok(Err(e)) if is_transient(&e) => {
                debug!(%url, "Connection attempt failed: {e}");
            }
            Ok(Err(e)) => {
                error!(%url, "Unexpected stream error: {e}");
                shared.transition(StreamState::Error);
                shared.transition(StreamState::Disconnected);
                break;
            }
            Err(_) => {
                debug!(%url, "Connection attempt timed out");
            }
        }

        if !shared.transition(StreamState::Retrying) {
            break;
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(config.retry_interval) => {}
        }
    }

    debug!(%url, "Stream worker exited");
}

/// Network-level failures that are worth another attempt.
fn is_transient(error: &WsError) -> bool {
    matches!(
        error,
        WsError::Io(_)
            | WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(_)
            | WsError::Http(_)
            | WsError::HttpFormat(_)
    )
}

/// Run one connection until it drops or the worker is cancelled.
async fn serve(
    socket: Socket,
    config: &StreamSinkConfig,
    shared: &Shared,
    cancel: &CancellationToken,
) {
    let connection = cancel.child_token();
    let (mut write, mut read) = socket.split();

    let inbound = async {
        loop {
            let frame = tokio::select! {
                biased;
                () = connection.cancelled() => break,
                frame = read.next() => frame,
            };
            match frame {
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Server closed the stream");
                    break;
                }
                Some(Ok(message)) => trace!(len = message.len(), "Discarding inbound frame"),
                Some(Err(e)) => {
                    warn!("Stream read failed: {e}");
                    break;
                }
                None => break,
            }
        }
        connection.cancel();
    };

    let outbound = async {
        'drain: loop {
            while let Some(message) = shared.pop() {
                let text = message.into_text();
                if let Err(e) = write.send(Message::Text(text)).await {
                    // Popped messages are not requeued.
                    warn!("Stream write failed; message dropped: {e}");
                    break 'drain;
                }
            }
            tokio::select! {
                biased;
                () = connection.cancelled() => break,
                () = shared.wait_pending() => {}
            }
        }
        connection.cancel();
        if cancel.is_cancelled() {
            let _ = write.send(Message::Close(None)).await;
        }
        let _ = write.close().await;
    };

    let monitor = async {
        let mut ticker = tokio::time::interval(config.queue_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                () = connection.cancelled() => break,
                _ = ticker.tick() => {
                    let depth = shared.queue_len();
                    if depth > 0 {
                        warn!(depth, "Outbound stream queue is not draining");
                    }
                }
            }
        }
    };

    tokio::join!(inbound, outbound, monitor);

    // Whatever ended the connection, nothing queued for it survives.
    shared.transition(StreamState::Retrying);
}

//! Reachability checks for sink targets.
//!
//! Both checks answer a yes/no question and log the reason for a "no".
//! A UDP check can only prove the datagram left this host.

use std::time::Duration;

use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, warn};

/// Default time budget for a probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Send an empty datagram to `host:port`.
///
/// Returns `true` if the send did not fail locally within `timeout`.
pub async fn probe_udp(host: &str, port: u16, timeout: Duration) -> bool {
    let attempt = async {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.send_to(&[], (host, port)).await
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(_)) => {
            debug!(host, port, "UDP probe sent");
            true
        }
        Ok(Err(e)) => {
            warn!(host, port, "UDP probe failed: {e}");
            false
        }
        Err(_) => {
            warn!(host, port, "UDP probe timed out");
            false
        }
    }
}

/// Open and close a TCP connection to `host:port`.
pub async fn probe_tcp(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => {
            debug!(host, port, "TCP probe connected");
            true
        }
        Ok(Err(e)) => {
            warn!(host, port, "Failed to connect: {e}");
            false
        }
        Err(_) => {
            warn!(host, port, "TCP probe timed out");
            false
        }
    }
}

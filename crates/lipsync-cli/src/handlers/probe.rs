//! Probe command handler.

use std::time::Duration;

use anyhow::Result;
use lipsync_runtime::{probe_tcp, probe_udp};

use crate::error::CliError;

/// Execute the probe command.
pub async fn execute(host: &str, port: u16, udp: bool, timeout_ms: u64) -> Result<()> {
    let timeout = Duration::from_millis(timeout_ms);
    let reachable = if udp {
        probe_udp(host, port, timeout).await
    } else {
        probe_tcp(host, port, timeout).await
    };

    let target = format!("{host}:{port}");
    if reachable {
        println!("{target} is reachable ({})", if udp { "udp" } else { "tcp" });
        Ok(())
    } else {
        Err(CliError::Unreachable(target).into())
    }
}

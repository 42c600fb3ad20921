//! Configuration snapshots for dispatch and sinks.
//!
//! These are plain value types. A sink takes its config by value when it is
//! built; changing host, port or flags mid-session means tearing the sink
//! down and building a new one.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::locator::DEFAULT_NEAREST_THRESHOLD_SECS;

/// Default OSC target port.
pub const DEFAULT_DATAGRAM_PORT: u16 = 12000;

/// Default OSC address prefix.
pub const DEFAULT_DATAGRAM_ADDRESS: &str = "/WLEDLipSync";

/// Default WebSocket target port.
pub const DEFAULT_STREAM_PORT: u16 = 8000;

/// Default WebSocket path.
pub const DEFAULT_STREAM_PATH: &str = "/ws";

/// Default port of the automation host's WebSocket server.
pub const DEFAULT_AUTOMATION_PORT: u16 = 8080;

/// Default dispatch loop quantum.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Emission flags and loop pacing for a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Emit each cue at most once per playback session.
    pub send_only_once: bool,
    /// Force one final emission when playback ends.
    pub send_on_end: bool,
    /// Emit when the position jumps while not playing.
    pub send_on_seek: bool,
    /// Loop quantum; also the virtual-time step.
    pub tick: Duration,
    /// Maximum distance for the "nearest" cue, in seconds.
    pub nearest_threshold: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_only_once: true,
            send_on_end: true,
            send_on_seek: true,
            tick: DEFAULT_TICK,
            nearest_threshold: DEFAULT_NEAREST_THRESHOLD_SECS,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroDuration("tick"));
        }
        if !(self.nearest_threshold.is_finite() && self.nearest_threshold > 0.0) {
            return Err(ConfigError::InvalidThreshold(self.nearest_threshold));
        }
        Ok(())
    }
}

/// Target and pacing of the OSC/UDP sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatagramSinkConfig {
    pub host: String,
    pub port: u16,
    /// OSC address prefix; cue messages go to `{address}/mouthCue/`.
    pub address: String,
    /// Pause after each worker iteration.
    pub pace: Duration,
    /// Messages beyond this many pending are dropped.
    pub queue_capacity: usize,
}

impl Default for DatagramSinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_DATAGRAM_PORT,
            address: DEFAULT_DATAGRAM_ADDRESS.to_string(),
            pace: Duration::from_millis(10),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl DatagramSinkConfig {
    /// Address pattern used for cue events.
    pub fn cue_address(&self) -> String {
        format!("{}/mouthCue/", self.address.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.host, self.port)?;
        if !self.address.starts_with('/') {
            return Err(ConfigError::InvalidAddress(self.address.clone()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

/// Timing hints carried by the `cast_image` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastImageConfig {
    pub device_number: u32,
    pub class_name: String,
    pub fps_number: u32,
    pub duration_number: u32,
}

impl Default for CastImageConfig {
    fn default() -> Self {
        Self {
            device_number: 0,
            class_name: "Media".to_string(),
            fps_number: 50,
            duration_number: 1,
        }
    }
}

/// Target, retry and queue settings of the WebSocket sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSinkConfig {
    pub host: String,
    pub port: u16,
    /// Optional path, e.g. `/ws`. Empty means the server root.
    pub path: String,
    /// Fixed pause between connection attempts.
    pub retry_interval: Duration,
    /// Give up reconnecting after this long without a connection.
    pub max_retry_time: Duration,
    /// Cadence of the backpressure monitor.
    pub queue_check_interval: Duration,
    /// Messages beyond this many pending are dropped.
    pub queue_capacity: usize,
    /// Bounded wait for workers in `stop()`.
    pub stop_timeout: Duration,
    pub cast: CastImageConfig,
}

impl Default for StreamSinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_STREAM_PORT,
            path: DEFAULT_STREAM_PATH.to_string(),
            retry_interval: Duration::from_secs(1),
            max_retry_time: Duration::from_secs(10),
            queue_check_interval: Duration::from_secs(5),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stop_timeout: Duration::from_secs(2),
            cast: CastImageConfig::default(),
        }
    }
}

impl StreamSinkConfig {
    /// Defaults for the automation host link: port 8080 at the server root.
    pub fn automation() -> Self {
        Self {
            port: DEFAULT_AUTOMATION_PORT,
            path: String::new(),
            ..Self::default()
        }
    }

    /// `ws://host:port/path`
    pub fn url(&self) -> String {
        let path = self.path.trim();
        if path.is_empty() || path.starts_with('/') {
            format!("ws://{}:{}{}", self.host, self.port, path)
        } else {
            format!("ws://{}:{}/{}", self.host, self.port, path)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.host, self.port)?;
        if self.retry_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("retry_interval"));
        }
        if self.queue_check_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("queue_check_interval"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

fn validate_endpoint(host: &str, port: u16) -> Result<(), ConfigError> {
    if host.trim().is_empty() {
        return Err(ConfigError::EmptyHost);
    }
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Host cannot be empty")]
    EmptyHost,

    #[error("Port must be non-zero, got {0}")]
    InvalidPort(u16),

    #[error("OSC address must start with '/', got {0:?}")]
    InvalidAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("Nearest-cue threshold must be a positive number, got {0}")]
    InvalidThreshold(f64),
}

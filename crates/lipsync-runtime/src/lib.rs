//! Runtime side of lipsync: network sinks, the playback clock adapter, the
//! dispatch loop and the external analyzer wrapper.
//!
//! Everything here runs on Tokio. Long-lived workers are owned by the
//! component that spawned them and shut down through a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) with a bounded
//! wait.

#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

pub mod analyzer;
pub mod automation;
pub mod broadcaster;
pub mod clock;
pub mod datagram;
pub mod dispatch;
pub mod error;
pub mod probe;
pub mod stream;

pub use analyzer::{
    Analyzer, AnalyzerCommand, AnalyzerConfig, AnalyzerError, AnalyzerEvent, AnalyzerRun,
    Recognizer,
};
pub use automation::AutomationLink;
pub use broadcaster::DispatchEventBroadcaster;
pub use clock::{
    MIN_SAMPLE_CADENCE, PlaybackClockAdapter, PlaybackReport, PositionSource, WallClockSource,
};
pub use datagram::{DatagramSink, DatagramStatus, OscType, cue_event_args};
pub use dispatch::{DispatchReport, DispatchSession, DriveSummary};
pub use error::SinkError;
pub use probe::{DEFAULT_PROBE_TIMEOUT, probe_tcp, probe_udp};
pub use stream::{OutboundMessage, StreamSink, StreamState};

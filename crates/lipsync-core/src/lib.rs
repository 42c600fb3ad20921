//! Core domain for viseme cue dispatch.
//!
//! Holds everything that does not touch the network: cue sets and their
//! lookup, the emission policy, the events handed to sinks, wire message
//! shapes, configuration snapshots and the ports implemented by
//! `lipsync-runtime`.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod cue;
pub mod error;
pub mod event;
pub mod locator;
pub mod policy;
pub mod ports;
pub mod protocol;
pub mod viseme;

// Re-export commonly used types for convenience
pub use config::{
    CastImageConfig, ConfigError, DatagramSinkConfig, DispatchConfig, StreamSinkConfig,
};
pub use cue::{Cue, CueMetadata, CueSet};
pub use error::CueError;
pub use event::{DispatchEvent, EmittedEvent, NONE_FIELD};
pub use locator::{CueLocator, CueMatch, DEFAULT_NEAREST_THRESHOLD_SECS};
pub use policy::{CueKey, DispatchPolicy, DispatchTrigger, TriggeredSet};
pub use ports::{ClockSample, CueSink, NoopSink, PlaybackClock, PlaybackStatus};
pub use protocol::{Action, ActionMessage};
pub use viseme::{FALLBACK_INDEX, Viseme};

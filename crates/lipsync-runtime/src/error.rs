//! Sink construction errors.
//!
//! Transport failures after construction never surface here; they are
//! logged by the sink and reflected in its status.

use lipsync_core::ConfigError;

/// Errors raised while building a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink configuration failed validation.
    #[error("Invalid sink configuration: {0}")]
    Config(#[from] ConfigError),

    /// The local socket could not be bound.
    #[error("Failed to bind local socket: {0}")]
    Bind(#[source] std::io::Error),
}

//! Command handlers.
//!
//! Each handler parses nothing itself: it takes already-validated
//! arguments, calls into `lipsync-core`/`lipsync-runtime` and formats the
//! result for the terminal.

pub mod analyze;
pub mod edit;
pub mod locate;
pub mod play;
pub mod probe;

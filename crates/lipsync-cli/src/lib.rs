//! Command-line front end for lipsync.
//!
//! The binary in `main.rs` only wires logging, `.env` loading and command
//! dispatch; everything else lives here so it can be tested.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by main.rs binary
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use commands::{AnalyzeArgs, Commands, PlayArgs};
pub use error::CliError;
pub use parser::Cli;

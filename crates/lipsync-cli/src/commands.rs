//! Subcommands and their argument groups.
//!
//! Sink and dispatch settings can also come from `LIPSYNC_*` environment
//! variables (or a `.env` file).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use lipsync_core::config::{
    DEFAULT_AUTOMATION_PORT, DEFAULT_DATAGRAM_ADDRESS, DEFAULT_DATAGRAM_PORT, DEFAULT_STREAM_PATH,
    DEFAULT_STREAM_PORT,
};
use lipsync_core::{
    DEFAULT_NEAREST_THRESHOLD_SECS, DatagramSinkConfig, DispatchConfig, StreamSinkConfig, Viseme,
};
use lipsync_runtime::{AnalyzerConfig, Recognizer};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Play a cue file against a wall clock and dispatch cues to sinks
    Play(PlayArgs),

    /// Show the active and nearest cue at a time
    Locate {
        /// Cue file produced by the analyzer
        cues: PathBuf,
        /// Playback time in seconds
        time: f64,
        /// Maximum distance for the nearest cue, in seconds
        #[arg(long, default_value_t = DEFAULT_NEAREST_THRESHOLD_SECS)]
        threshold: f64,
        /// Print the event as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change the mouth shape of one cue
    Edit {
        /// Cue file to edit
        cues: PathBuf,
        /// Start time of the cue, in seconds
        #[arg(long)]
        start: f64,
        /// New mouth shape (A-H or X)
        #[arg(long)]
        value: Viseme,
        /// Write to this file instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the speech analyzer on an audio file
    Analyze(AnalyzeArgs),

    /// Check whether a sink target is reachable
    Probe {
        /// Target host
        host: String,
        /// Target port
        port: u16,
        /// Send an empty datagram instead of opening a TCP connection
        #[arg(long)]
        udp: bool,
        /// Time budget in milliseconds
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

/// Options for `play`.
#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    /// Cue file produced by the analyzer
    pub cues: PathBuf,

    /// Start position in seconds
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// Send the sinks' init messages before playing
    #[arg(long)]
    pub announce: bool,

    /// Include the cue document in the init messages
    #[arg(long, requires = "announce")]
    pub with_cues: bool,

    #[command(flatten)]
    pub dispatch: DispatchArgs,

    #[command(flatten)]
    pub osc: OscArgs,

    #[command(flatten)]
    pub ws: WsArgs,

    #[command(flatten)]
    pub cha: ChaArgs,
}

/// Emission flags and loop pacing.
#[derive(Args, Debug, Clone)]
pub struct DispatchArgs {
    /// Emit a cue again on every tick instead of once per session
    #[arg(long, env = "LIPSYNC_SEND_EVERY_TICK")]
    pub send_every_tick: bool,

    /// Skip the final emission at the end of playback
    #[arg(long, env = "LIPSYNC_NO_SEND_ON_END")]
    pub no_send_on_end: bool,

    /// Dispatch loop quantum in milliseconds
    #[arg(long, env = "LIPSYNC_TICK_MS", default_value_t = 10)]
    pub tick_ms: u64,

    /// How often the player position is sampled, in milliseconds
    #[arg(long, env = "LIPSYNC_SAMPLE_MS", default_value_t = 50)]
    pub sample_ms: u64,
}

impl DispatchArgs {
    pub fn to_config(&self) -> DispatchConfig {
        DispatchConfig {
            send_only_once: !self.send_every_tick,
            send_on_end: !self.no_send_on_end,
            tick: Duration::from_millis(self.tick_ms),
            ..DispatchConfig::default()
        }
    }
}

/// OSC datagram sink target.
#[derive(Args, Debug, Clone)]
pub struct OscArgs {
    /// Enable the OSC sink
    #[arg(long, env = "LIPSYNC_OSC")]
    pub osc: bool,

    #[arg(long, env = "LIPSYNC_OSC_HOST", default_value = "127.0.0.1")]
    pub osc_host: String,

    #[arg(long, env = "LIPSYNC_OSC_PORT", default_value_t = DEFAULT_DATAGRAM_PORT)]
    pub osc_port: u16,

    /// OSC address prefix
    #[arg(long, env = "LIPSYNC_OSC_ADDRESS", default_value = DEFAULT_DATAGRAM_ADDRESS)]
    pub osc_address: String,
}

impl OscArgs {
    pub fn to_config(&self) -> DatagramSinkConfig {
        DatagramSinkConfig {
            host: self.osc_host.clone(),
            port: self.osc_port,
            address: self.osc_address.clone(),
            ..DatagramSinkConfig::default()
        }
    }
}

/// WebSocket stream sink target.
#[derive(Args, Debug, Clone)]
pub struct WsArgs {
    /// Enable the WebSocket sink
    #[arg(long, env = "LIPSYNC_WS")]
    pub ws: bool,

    #[arg(long, env = "LIPSYNC_WS_HOST", default_value = "127.0.0.1")]
    pub ws_host: String,

    #[arg(long, env = "LIPSYNC_WS_PORT", default_value_t = DEFAULT_STREAM_PORT)]
    pub ws_port: u16,

    #[arg(long, env = "LIPSYNC_WS_PATH", default_value = DEFAULT_STREAM_PATH)]
    pub ws_path: String,

    /// Device selector carried by cast_image actions
    #[arg(long, env = "LIPSYNC_WS_DEVICE", default_value_t = 0)]
    pub ws_device: u32,
}

impl WsArgs {
    pub fn to_config(&self) -> StreamSinkConfig {
        let mut config = StreamSinkConfig {
            host: self.ws_host.clone(),
            port: self.ws_port,
            path: self.ws_path.clone(),
            ..StreamSinkConfig::default()
        };
        config.cast.device_number = self.ws_device;
        config
    }
}

/// Automation host link. It only receives the `init_cha` greeting.
#[derive(Args, Debug, Clone)]
pub struct ChaArgs {
    /// Greet the automation host over WebSocket
    #[arg(long, env = "LIPSYNC_CHA")]
    pub cha: bool,

    #[arg(long, env = "LIPSYNC_CHA_HOST", default_value = "127.0.0.1")]
    pub cha_host: String,

    #[arg(long, env = "LIPSYNC_CHA_PORT", default_value_t = DEFAULT_AUTOMATION_PORT)]
    pub cha_port: u16,

    #[arg(long, env = "LIPSYNC_CHA_PATH", default_value = "")]
    pub cha_path: String,
}

impl ChaArgs {
    pub fn to_config(&self) -> StreamSinkConfig {
        StreamSinkConfig {
            host: self.cha_host.clone(),
            port: self.cha_port,
            path: self.cha_path.clone(),
            ..StreamSinkConfig::automation()
        }
    }
}

/// Options for `analyze`.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Audio file to analyze (WAV or OGG)
    pub input: PathBuf,

    /// Output path without extension; `.json` is appended
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Analyzer executable
    #[arg(long, env = "LIPSYNC_ANALYZER", default_value = "rhubarb")]
    pub executable: PathBuf,

    /// Recognizer: pocketSphinx or phonetic
    #[arg(long, env = "LIPSYNC_RECOGNIZER", default_value = "pocketSphinx")]
    pub recognizer: Recognizer,

    /// Directory the analyzer runs in
    #[arg(long)]
    pub working_dir: Option<PathBuf>,
}

impl AnalyzeArgs {
    pub fn to_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            executable: self.executable.clone(),
            recognizer: self.recognizer,
            working_dir: self.working_dir.clone(),
        }
    }

    /// Explicit output stem, or the input path without its extension.
    pub fn output_stem(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension(""))
    }
}

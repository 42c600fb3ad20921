//! Wrapper around the external speech analyzer (Rhubarb Lip Sync).
//!
//! The analyzer runs as a child process. Its machine-readable stderr is a
//! stream of JSON lines; those carrying a `value` are progress reports.
//! Everything the process prints is turned into [`AnalyzerEvent`]s on a
//! channel, ending with exactly one `Finished`.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Buffered events per run before readers wait on the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors from starting or finishing an analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("An analysis is already running")]
    AlreadyRunning,

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Failed to spawn analyzer {}: {source}", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Analyzer exited with code {code:?}")]
    Failed { code: Option<i32> },

    #[error("Unknown recognizer: {0}")]
    UnknownRecognizer(String),
}

/// Speech recognizer used by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Recognizer {
    /// Speech recognition for English dialogue.
    #[default]
    PocketSphinx,
    /// Language-independent phonetic recognition.
    Phonetic,
}

impl Recognizer {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PocketSphinx => "pocketSphinx",
            Self::Phonetic => "phonetic",
        }
    }
}

impl fmt::Display for Recognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recognizer {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pocketSphinx" | "pocketsphinx" => Ok(Self::PocketSphinx),
            "phonetic" => Ok(Self::Phonetic),
            other => Err(AnalyzerError::UnknownRecognizer(other.to_string())),
        }
    }
}

/// Static settings of the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub executable: PathBuf,
    pub recognizer: Recognizer,
    /// Directory the process runs in; the current one when unset.
    pub working_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("rhubarb"),
            recognizer: Recognizer::default(),
            working_dir: None,
        }
    }
}

/// A fully specified analyzer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerCommand {
    pub executable: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub recognizer: Recognizer,
    pub working_dir: Option<PathBuf>,
}

impl AnalyzerCommand {
    /// Output goes to `output_stem` with a `.json` extension.
    pub fn new(config: &AnalyzerConfig, input: &Path, output_stem: &Path) -> Self {
        let mut output = output_stem.as_os_str().to_owned();
        output.push(".json");
        Self {
            executable: config.executable.clone(),
            input: input.to_path_buf(),
            output: PathBuf::from(output),
            recognizer: config.recognizer,
            working_dir: config.working_dir.clone(),
        }
    }

    pub fn args(&self) -> Vec<OsString> {
        vec![
            self.input.clone().into_os_string(),
            "--machineReadable".into(),
            "-r".into(),
            self.recognizer.as_str().into(),
            "-f".into(),
            "json".into(),
            "--consoleLevel".into(),
            "Info".into(),
            "-o".into(),
            self.output.clone().into_os_string(),
        ]
    }
}

/// Something the analyzer reported.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerEvent {
    /// Fraction of the work done, `0.0..=1.0`.
    Progress(f64),
    /// Any other JSON line.
    Message { value: Value, stderr: bool },
    /// A line that is not JSON.
    Output { line: String, stderr: bool },
    /// The process exited. Always the last event.
    Finished { code: Option<i32> },
}

/// Runs the analyzer, one invocation at a time.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
    running: Arc<AtomicBool>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start analyzing `input`. Returns immediately with a handle to the
    /// event stream.
    pub fn run(&self, input: &Path, output_stem: &Path) -> Result<AnalyzerRun, AnalyzerError> {
        if !input.exists() {
            return Err(AnalyzerError::InputNotFound(input.to_path_buf()));
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AnalyzerError::AlreadyRunning);
        }
        let guard = RunningGuard(Arc::clone(&self.running));

        let command = AnalyzerCommand::new(&self.config, input, output_stem);
        let mut cmd = Command::new(&command.executable);
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| AnalyzerError::Spawn {
            executable: command.executable.clone(),
            source,
        })?;

        info!(
            input = %command.input.display(),
            output = %command.output.display(),
            recognizer = %command.recognizer,
            "Analyzer started"
        );

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let stdout = child.stdout.take().map(|s| tokio::spawn(read_lines(s, false, tx.clone())));
        let stderr = child.stderr.take().map(|s| tokio::spawn(read_lines(s, true, tx.clone())));

        let cancel_token = CancellationToken::new();
        let abandoned = cancel_token.clone();

        tokio::spawn(async move {
            let code = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => status.code(),
                    Err(e) => {
                        warn!("Failed to wait for analyzer: {e}");
                        None
                    }
                },
                () = abandoned.cancelled() => {
                    info!("Analysis abandoned; killing analyzer");
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill analyzer: {e}");
                    }
                    for reader in [stdout, stderr].into_iter().flatten() {
                        reader.abort();
                    }
                    drop(guard);
                    return;
                }
            };
            // Drain the pipes so Finished really is last.
            for reader in [stdout, stderr].into_iter().flatten() {
                let _ = reader.await;
            }
            info!(?code, "Analyzer finished");
            drop(guard);
            let _ = tx.send(AnalyzerEvent::Finished { code }).await;
        });

        Ok(AnalyzerRun {
            events: rx,
            output: command.output,
            cancel_token,
        })
    }
}

/// Clears the running flag when the run's waiter finishes.
#[derive(Debug)]
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn read_lines<R>(pipe: R, stderr: bool, tx: mpsc::Sender<AnalyzerEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = parse_line(line, stderr);
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

fn parse_line(line: &str, stderr: bool) -> AnalyzerEvent {
    match serde_json::from_str::<Value>(line) {
        Ok(value) => match value.get("value").and_then(Value::as_f64) {
            Some(progress) if stderr => AnalyzerEvent::Progress(progress.clamp(0.0, 1.0)),
            _ => AnalyzerEvent::Message { value, stderr },
        },
        Err(_) => {
            debug!(stderr, "analyzer: {line}");
            AnalyzerEvent::Output {
                line: line.to_string(),
                stderr,
            }
        }
    }
}

/// A running analysis. Dropping it kills the analyzer if it is still
/// running.
#[derive(Debug)]
pub struct AnalyzerRun {
    events: mpsc::Receiver<AnalyzerEvent>,
    output: PathBuf,
    cancel_token: CancellationToken,
}

impl AnalyzerRun {
    /// Where the cue document is written.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Next event, or `None` after `Finished` has been delivered.
    pub async fn next_event(&mut self) -> Option<AnalyzerEvent> {
        self.events.recv().await
    }

    /// Wait for the process, discarding intermediate events.
    pub async fn wait(mut self) -> Result<PathBuf, AnalyzerError> {
        while let Some(event) = self.events.recv().await {
            if let AnalyzerEvent::Finished { code } = event {
                return if code == Some(0) {
                    Ok(std::mem::take(&mut self.output))
                } else {
                    Err(AnalyzerError::Failed { code })
                };
            }
        }
        Err(AnalyzerError::Failed { code: None })
    }
}

impl Drop for AnalyzerRun {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

//! Analyze command handler.
//!
//! Runs the speech analyzer and reports its progress as a percentage.

use std::io::Write;

use anyhow::Result;
use lipsync_core::CueSet;
use lipsync_runtime::{Analyzer, AnalyzerError, AnalyzerEvent};
use tracing::debug;

use crate::commands::AnalyzeArgs;
use crate::error::CliError;

/// Execute the analyze command.
pub async fn execute(args: &AnalyzeArgs) -> Result<()> {
    let analyzer = Analyzer::new(args.to_config());
    let mut run = analyzer
        .run(&args.input, &args.output_stem())
        .map_err(CliError::from)?;

    println!("Analyzing {} ...", args.input.display());

    let mut last_percent = None;
    let mut exit_code = None;
    while let Some(event) = run.next_event().await {
        match event {
            AnalyzerEvent::Progress(fraction) => {
                let percent = to_percent(fraction);
                if last_percent != Some(percent) {
                    print!("\r  {percent:>3}%");
                    std::io::stdout().flush().ok();
                    last_percent = Some(percent);
                }
            }
            AnalyzerEvent::Message { value, stderr } => debug!(stderr, %value, "analyzer message"),
            AnalyzerEvent::Output { line, stderr } => debug!(stderr, "analyzer: {line}"),
            AnalyzerEvent::Finished { code } => exit_code = Some(code),
        }
    }
    println!();

    let code = exit_code.flatten();
    if code != Some(0) {
        return Err(CliError::from(AnalyzerError::Failed { code }).into());
    }

    let output = run.output_path();
    let set = CueSet::load(output).map_err(CliError::from)?;
    println!(
        "Wrote {} cue(s) covering {:.3}s to {}",
        set.len(),
        set.duration(),
        output.display()
    );
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn to_percent(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

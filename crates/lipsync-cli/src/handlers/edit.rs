//! Edit command handler.

use std::path::Path;

use anyhow::Result;
use lipsync_core::{CueSet, Viseme};

use crate::error::CliError;

/// Execute the edit command.
///
/// Replaces the value of the cue starting at `start` and writes the file
/// back (or to `output`).
pub fn execute(cues: &Path, start: f64, value: Viseme, output: Option<&Path>) -> Result<()> {
    let mut set = CueSet::load(cues).map_err(CliError::from)?;
    set.set_value(start, value).map_err(CliError::from)?;

    let target = output.unwrap_or(cues);
    if set.is_dirty() || output.is_some() {
        set.save(target).map_err(CliError::from)?;
        println!("Cue at {start:.3} set to {value}; saved to {}", target.display());
    } else {
        println!("Cue at {start:.3} already shows {value}; nothing to save");
    }
    Ok(())
}

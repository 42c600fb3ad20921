//! Locate command handler.

use std::path::Path;

use anyhow::Result;
use lipsync_core::{Cue, CueLocator, CueSet, DispatchEvent, NONE_FIELD};

use crate::error::CliError;

/// Execute the locate command.
///
/// Prints the active cue at `time` and the cue whose start is nearest to
/// it, or the JSON form of the event a sink would receive.
pub fn execute(cues: &Path, time: f64, threshold: f64, json: bool) -> Result<()> {
    let set = CueSet::load(cues).map_err(CliError::from)?;
    let locator = CueLocator::new(threshold);
    let event = DispatchEvent::new(time, locator.locate(&set, time));

    if json {
        println!("{}", serde_json::to_string_pretty(&event)?);
        return Ok(());
    }

    println!("Time:    {}", event.time_text());
    println!("Active:  {}", describe(event.active.as_ref()));
    println!("Nearest: {}", describe(event.next.as_ref()));
    Ok(())
}

fn describe(cue: Option<&Cue>) -> String {
    cue.map_or_else(
        || NONE_FIELD.to_string(),
        |c| format!("{} [{:.3}, {:.3})", c.value, c.start, c.end),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipsync_core::Viseme;

    #[test]
    fn test_describe() {
        assert_eq!(describe(None), "None");
        assert_eq!(
            describe(Some(&Cue::new(0.5, 1.2, Viseme::A))),
            "A [0.500, 1.200)"
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = execute(Path::new("/nonexistent/cues.json"), 0.0, 5.0, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Cue(_))
        ));
    }
}

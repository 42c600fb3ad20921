//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Drive viseme cues to OSC and WebSocket consumers.
#[derive(Parser)]
#[command(name = "lipsync")]
#[command(about = "Dispatch viseme cues in sync with playback")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Commands;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_verbose_after_subcommand() {
        let cli = Cli::parse_from(["lipsync", "locate", "cues.json", "0.7", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Locate { .. }));
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["lipsync"]).is_err());
    }
}

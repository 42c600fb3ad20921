//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lipsync_cli::{Cli, CliError, Commands, handlers};

/// Log level comes from `RUST_LOG`, else `debug` with `--verbose`, else
/// `info`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Play(args) => handlers::play::execute(args).await,
        Commands::Locate {
            cues,
            time,
            threshold,
            json,
        } => handlers::locate::execute(&cues, time, threshold, json),
        Commands::Edit {
            cues,
            start,
            value,
            output,
        } => handlers::edit::execute(&cues, start, value, output.as_deref()),
        Commands::Analyze(args) => handlers::analyze::execute(&args).await,
        Commands::Probe {
            host,
            port,
            udp,
            timeout_ms,
        } => handlers::probe::execute(&host, port, udp, timeout_ms).await,
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads LIPSYNC_* defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(cli.command).await {
        eprintln!("Error: {e:#}");
        let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}

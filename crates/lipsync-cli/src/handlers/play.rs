//! Play command handler.
//!
//! Simulates a player with a wall clock, feeds it through the clock
//! adapter and runs one dispatch session against the enabled sinks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use lipsync_core::{CueSet, EmittedEvent, NONE_FIELD, PlaybackStatus};
use lipsync_runtime::{
    AutomationLink, DatagramSink, DispatchSession, PlaybackClockAdapter, PositionSource,
    StreamSink, WallClockSource,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::PlayArgs;
use crate::error::CliError;

/// Execute the play command.
pub async fn execute(args: PlayArgs) -> Result<()> {
    let cues = Arc::new(CueSet::load_or_empty(&args.cues));
    if cues.is_empty() {
        println!("Nothing to dispatch: {} has no usable cues.", args.cues.display());
        return Ok(());
    }

    let mut session = DispatchSession::new(Arc::clone(&cues), &args.dispatch.to_config())
        .map_err(CliError::from)?;

    let datagram = if args.osc.osc {
        let sink = Arc::new(
            DatagramSink::start(args.osc.to_config())
                .await
                .map_err(CliError::from)?,
        );
        session.add_sink(sink.clone());
        Some(sink)
    } else {
        None
    };

    let stream = if args.ws.ws {
        let sink = Arc::new(StreamSink::new(args.ws.to_config()).map_err(CliError::from)?);
        sink.start();
        wait_connected(&sink).await;
        session.add_sink(sink.clone());
        Some(sink)
    } else {
        None
    };

    let automation = if args.cha.cha {
        let link = AutomationLink::new(args.cha.to_config()).map_err(CliError::from)?;
        link.start();
        let url = link.config().url();
        if link.wait_connected(link.config().max_retry_time).await {
            info!(%url, "Automation host connected");
        } else {
            warn!(%url, status = %link.status(), "Automation host not connected yet");
        }
        Some(link)
    } else {
        None
    };

    if session.sink_count() == 0 {
        println!("No sink enabled; printing cues only (use --osc and/or --ws).");
    }

    if args.announce {
        session.announce(args.with_cues);
    }

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    let printer = tokio::spawn(print_events(session.subscribe()));

    let adapter = Arc::new(PlaybackClockAdapter::new());
    let source: Arc<dyn PositionSource> =
        Arc::new(WallClockSource::new(args.start, cues.duration()));
    let sampler_cancel = cancel.child_token();
    let sampler = adapter.spawn_sampler(
        source,
        Duration::from_millis(args.dispatch.sample_ms.max(1)),
        sampler_cancel.clone(),
    );

    // The first sample switches the adapter out of `stopped`.
    let mut status = adapter.subscribe_status();
    let _ = status.wait_for(|s| *s != PlaybackStatus::Stopped).await;

    let report = session.run(adapter.as_ref(), &cancel).await;

    sampler_cancel.cancel();
    let _ = sampler.await;

    if let Some(sink) = &datagram {
        // Let the worker flush what the session queued.
        tokio::time::sleep(Duration::from_millis(50)).await;
        sink.stop().await;
    }
    if let Some(sink) = &stream {
        sink.stop().await;
    }
    if let Some(link) = &automation {
        link.stop().await;
    }

    drop(session);
    let _ = printer.await;

    println!();
    println!(
        "Ticks: {}  Emitted: {}  Final status: {:?}{}",
        report.ticks,
        report.emitted,
        report.final_status,
        if report.cancelled { " (interrupted)" } else { "" }
    );
    Ok(())
}

async fn wait_connected(sink: &StreamSink) {
    let url = sink.config().url();
    if sink.wait_connected(sink.config().max_retry_time).await {
        info!(%url, "WebSocket connected");
    } else {
        warn!(%url, status = %sink.status(), "WebSocket not connected; its cues will be dropped");
    }
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            cancel.cancel();
        }
    });
}

async fn print_events(mut events: broadcast::Receiver<EmittedEvent>) {
    loop {
        match events.recv().await {
            Ok(emitted) => {
                let event = emitted.event;
                let active = event
                    .active_value()
                    .map_or_else(|| NONE_FIELD.to_string(), |v| v.to_string());
                let next = event.next.map_or_else(
                    || NONE_FIELD.to_string(),
                    |c| format!("{} @ {:.3}", c.value, c.start),
                );
                let trigger = format!("{:?}", emitted.trigger);
                println!("{:>9}  {trigger:<5}  {active:<4} next: {next}", event.time_text());
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

//! xivpatch binary entry point.
//!
//! This is a thin wrapper around the xivpatch-injector library that:
//! 1. Initializes logging
//! 2. Parses and validates configuration
//! 3. Runs the patch pipeline on a blocking worker
//! 4. Turns Ctrl-C into a cancellation between two items
//!
//! For library usage, see the xivpatch-injector crate documentation.

use anyhow::Result;
use tokio::sync::mpsc;
use xivpatch_injector::{CancellationToken, PatchConfig, PatchSink, Pipeline};

/// Event sent from the worker to the main task
#[derive(Debug)]
enum PatchEvent {
    Log(String),
    Progress(f64),
}

/// Sink that forwards events over a channel
struct ChannelSink(mpsc::UnboundedSender<PatchEvent>);

impl PatchSink for ChannelSink {
    fn on_log(&self, message: &str) {
        let _ = self.0.send(PatchEvent::Log(message.to_string()));
    }

    fn on_progress(&self, fraction: f64) {
        let _ = self.0.send(PatchEvent::Progress(fraction));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse configuration from CLI args
    let config = PatchConfig::from_args();

    tracing::info!(
        "Configuration loaded: game={}, resources={}, language={:?}, dry_run={}",
        config.game_root.display(),
        config.resource_root.display(),
        config.language,
        config.dry_run
    );

    // Validate configuration
    config.validate()?;

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let worker_cancel = cancel.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let sink = ChannelSink(tx);
        Pipeline::new(&config, &sink)
            .with_cancellation(worker_cancel)
            .run()
    });

    // The channel closes when the worker drops its sink
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(PatchEvent::Log(message)) => tracing::info!("{}", message),
                Some(PatchEvent::Progress(fraction)) => {
                    tracing::debug!("Progress: {:.1}%", fraction * 100.0);
                }
                None => break,
            },
            result = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                result?;
                tracing::warn!("Cancelling after the current item");
                cancel.cancel();
            }
        }
    }

    let report = worker.await??;
    tracing::info!("Done: {}", report);
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

//! `wavehomed`: gesture detections in, device actions out.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wavehome_dispatch::{Dispatcher, HomeAssistantClient};
use wavehome_events::{EventFeed, PipelineEvent, PipelineStats};
use wavehome_ingress::{DetectionBus, IngressServer};
use wavehome_mappings::{spawn_reload_watcher, ConfigHandle, DEFAULT_WATCH_INTERVAL};
use wavehome_pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "wavehomed", version, about = "Map hand gestures to smart-home actions")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the ingress listen address from the config file.
    #[arg(long)]
    listen: Option<String>,

    /// Validate the config and the actuation service connection, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let (handle, config) =
        ConfigHandle::load(&cli.config).context("failed to load configuration")?;
    let client = HomeAssistantClient::from_env(
        &config.home_assistant.base_url,
        &config.home_assistant.token_env,
    )
    .context("failed to build Home Assistant client")?;

    if cli.check {
        client
            .ping()
            .await
            .context("Home Assistant is not reachable")?;
        info!(
            mappings = handle.current().table.len(),
            "configuration valid, Home Assistant reachable"
        );
        return Ok(());
    }

    let listen = cli.listen.unwrap_or(config.ingress.listen);
    let server = IngressServer::bind(&listen).await?;

    let handle = Arc::new(handle);
    let cancel = CancellationToken::new();
    let stats = Arc::new(PipelineStats::new());
    let feed = EventFeed::new();
    let mut bus = DetectionBus::new();
    let detections = match bus.take_receiver() {
        Some(rx) => rx,
        None => anyhow::bail!("detection channel already taken"),
    };

    let watcher = spawn_reload_watcher(Arc::clone(&handle), DEFAULT_WATCH_INTERVAL, cancel.clone());
    let logger = tokio::spawn(log_feed(feed.subscribe()));
    let ingress = tokio::spawn(server.run(bus.sender(), Arc::clone(&stats), cancel.clone()));

    let pipeline = Pipeline::new(
        Dispatcher::new(Arc::new(client)),
        feed,
        Arc::clone(&stats),
        handle.subscribe(),
    );
    let pipeline = tokio::spawn(pipeline.run(detections, cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    cancel.cancel();

    let _ = pipeline.await;
    let _ = ingress.await;
    let _ = watcher.await;
    // The pipeline owned the last feed sender, so the logger drains
    // whatever the drain flushed and exits on Closed.
    let _ = logger.await;

    info!(counters = ?stats.snapshot(), "final pipeline counters");
    Ok(())
}

/// Mirror pipeline events into the log.
async fn log_feed(mut rx: tokio::sync::broadcast::Receiver<PipelineEvent>) {
    loop {
        match rx.recv().await {
            Ok(PipelineEvent::Occurrence(occ)) => {
                info!(
                    gesture = %occ.gesture,
                    hand = %occ.hand,
                    confidence = occ.confidence,
                    "gesture confirmed"
                );
            }
            Ok(PipelineEvent::Outcome(outcome)) => {
                if outcome.success {
                    info!(
                        mapping = %outcome.mapping_name,
                        target = %outcome.target_id,
                        duration_ms = outcome.duration_ms,
                        "action completed"
                    );
                } else {
                    warn!(
                        mapping = %outcome.mapping_name,
                        target = %outcome.target_id,
                        error = outcome.error.as_deref().unwrap_or("unknown"),
                        "action failed"
                    );
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "feed logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

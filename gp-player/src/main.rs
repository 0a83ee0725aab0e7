//! GridPlay headless player
//!
//! Loads a session, plays it back on the shared clock and writes frames to
//! the configured sinks until playback reaches the end or ctrl-c.

use anyhow::{Context, Result};
use clap::Parser;
use gp_player::config::PlayerConfig;
use gp_player::playback::{forward_frames, start_playback_task, SinkHandle};
use gp_player::replay::{PlaybackCommand, ReplayState};
use gp_player::state::AppState;
use gp_sources::catalog;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = PlayerConfig::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    if config.list {
        return list_sessions(&config);
    }

    let source = config.source()?;
    info!("Loading session from {}", source.name());
    let session = tokio::task::spawn_blocking(move || source.load())
        .await
        .context("Session loader panicked")??;

    let state = AppState::new();
    let replay = ReplayState::from_session(Arc::new(session), config.selection());
    let info = state.load(replay).await;
    info!(
        "{} at {}: {} drivers, {:.1}s of playback",
        info.title,
        info.circuit,
        info.drivers.len(),
        info.duration_secs
    );
    if info.drivers.is_empty() {
        warn!("No drivers match the selection, nothing to play");
        return Ok(());
    }

    let start = config
        .start
        .unwrap_or(if config.rate < 0.0 { info.duration_secs } else { 0.0 });
    state.control(PlaybackCommand::SetRate(config.rate)).await;
    state.control(PlaybackCommand::Seek(start)).await;

    let sinks = config
        .sink_configs()
        .iter()
        .map(SinkHandle::from_config)
        .collect::<Result<Vec<_>>>()?;
    let rx = state.subscribe();
    let cancel = CancellationToken::new();
    let mut forwarder = tokio::spawn(forward_frames(rx, sinks, cancel.clone()));

    let playback = start_playback_task(state.clone(), config.tick_interval()).await;
    state.control(PlaybackCommand::Play).await;

    let forwarded = tokio::select! {
        result = &mut forwarder => result.context("Frame forwarder panicked")??,
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            info!("Interrupted");
            cancel.cancel();
            forwarder.await.context("Frame forwarder panicked")??
        }
    };

    state.unload().await;
    playback.await.context("Playback task panicked")?;

    info!("Played {} frames", forwarded);
    Ok(())
}

fn list_sessions(config: &PlayerConfig) -> Result<()> {
    let Some(dir) = config.data_dir() else {
        warn!("No data directory available on this platform; pass --data-dir");
        return Ok(());
    };

    let sessions = catalog::discover(&dir)?;
    if sessions.is_empty() {
        println!("No sessions in {}", dir.display());
    }
    for session in sessions {
        println!("{:<32} {}", session.name, session.path.display());
    }
    Ok(())
}

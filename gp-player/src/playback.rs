//! Playback task and frame forwarding
//!
//! The playback task owns the passage of wall time: every tick it advances
//! the shared clock by the measured elapsed time, queries the engine at the
//! new cursor and broadcasts the resulting frame. Sinks consume frames from
//! the broadcast channel.

use crate::replay::Frame;
use crate::sinks::{create_sink, Sink, SinkConfig};
use crate::state::AppState;
use anyhow::Result;
use gp_core::FieldMask;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Start (or restart) the playback task.
///
/// A previously running task is cancelled first. The task ends when it is
/// cancelled or the replay is unloaded; a paused clock just idles.
pub async fn start_playback_task(state: AppState, tick: Duration) -> JoinHandle<()> {
    let cancel_token = {
        let mut cancel = state.replay_cancel.write().await;
        if let Some(token) = cancel.take() {
            token.cancel();
        }
        let token = CancellationToken::new();
        *cancel = Some(token.clone());
        token
    };

    let tx = state.frames_tx.clone();
    let replay = state.replay.clone();

    tokio::spawn(async move {
        info!("Playback task started ({}ms tick)", tick.as_millis());
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = sleep(tick) => {}
            }

            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            last = now;

            // Only the clock transition happens under the lock
            let step = {
                let mut rs = replay.write().await;
                match rs.as_mut() {
                    Some(rs) if rs.clock().is_playing() => {
                        Some((Arc::clone(rs.engine()), rs.tick(dt)))
                    }
                    Some(_) => None,
                    None => break,
                }
            };

            if let Some((engine, snapshot)) = step {
                let frame = Frame::capture(&engine, snapshot);
                if frame.is_final() {
                    info!("Playback reached {:.3}s and paused", frame.cursor);
                }
                // No subscribers is fine
                let _ = tx.send(frame);
            }
        }

        info!("Playback task stopped");
    })
}

/// A sink together with the field mask applied to its frames
pub struct SinkHandle {
    pub sink: Box<dyn Sink>,
    pub mask: Option<FieldMask>,
}

impl SinkHandle {
    pub fn from_config(config: &SinkConfig) -> Result<Self> {
        Ok(Self {
            sink: create_sink(config)?,
            mask: config.field_mask.as_deref().map(FieldMask::parse),
        })
    }
}

/// Hand every received frame to every sink until playback pauses, the
/// channel closes or `cancel` fires. Returns the number of frames forwarded.
///
/// A sink that fails is logged and dropped; the others keep running.
pub async fn forward_frames(
    mut rx: broadcast::Receiver<Frame>,
    mut sinks: Vec<SinkHandle>,
    cancel: CancellationToken,
) -> Result<u64> {
    let mut forwarded = 0;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(frame) => frame,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Sinks fell behind, skipped {} frames", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        sinks.retain_mut(|handle| match handle.sink.send(&frame, handle.mask.as_ref()) {
            Ok(()) => true,
            Err(e) => {
                error!("Sink {} failed, removing it: {:#}", handle.sink.name(), e);
                false
            }
        });
        forwarded += 1;

        if frame.is_final() {
            debug!("Final frame at {:.3}s", frame.cursor);
            break;
        }
    }

    for handle in &mut sinks {
        handle.sink.flush()?;
    }
    Ok(forwarded)
}

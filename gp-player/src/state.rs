//! Application state management

use crate::replay::{Frame, PlaybackCommand, ReplayInfo, ReplayState};
use gp_core::{ClockSnapshot, Selection};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Frames buffered per subscriber before it starts lagging
pub const FRAME_CHANNEL_CAPACITY: usize = 100;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Active replay (None until a session is loaded). Replaced wholesale
    /// when a different session is loaded.
    pub replay: Arc<RwLock<Option<ReplayState>>>,

    /// Broadcast channel for playback frames
    /// Multiple consumers can subscribe to receive frames
    pub frames_tx: broadcast::Sender<Frame>,

    /// Cancellation token for the playback task
    pub replay_cancel: Arc<RwLock<Option<CancellationToken>>>,
}

impl AppState {
    pub fn new() -> Self {
        let (frames_tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);

        Self {
            replay: Arc::new(RwLock::new(None)),
            frames_tx,
            replay_cancel: Arc::new(RwLock::new(None)),
        }
    }

    /// Subscribe to playback frames
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.frames_tx.subscribe()
    }

    /// Replace the active replay. Any running playback task is stopped.
    pub async fn load(&self, replay: ReplayState) -> ReplayInfo {
        self.stop_playback().await;
        let info = replay.info();
        info!("Loaded replay {} ({})", info.title, info.replay_id);
        *self.replay.write().await = Some(replay);
        info
    }

    /// Drop the active replay and stop playback.
    pub async fn unload(&self) {
        self.stop_playback().await;
        if self.replay.write().await.take().is_some() {
            info!("Replay unloaded");
        }
    }

    /// Cancel the playback task, if one is running.
    pub async fn stop_playback(&self) {
        let mut cancel = self.replay_cancel.write().await;
        if let Some(token) = cancel.take() {
            token.cancel();
        }
    }

    pub async fn info(&self) -> Option<ReplayInfo> {
        self.replay.read().await.as_ref().map(ReplayState::info)
    }

    /// Apply a transport command; `None` without an active replay.
    ///
    /// The command runs under the write lock, so no reader ever sees a
    /// half-applied transition.
    pub async fn control(&self, command: PlaybackCommand) -> Option<ClockSnapshot> {
        self.replay
            .write()
            .await
            .as_mut()
            .map(|replay| replay.apply(command))
    }

    /// Change the driver/lap selection of the active replay.
    pub async fn select(&self, selection: Selection) -> Option<ReplayInfo> {
        let mut replay = self.replay.write().await;
        let replay = replay.as_mut()?;
        replay.select(selection);
        Some(replay.info())
    }

    /// Frame at the current cursor of the active replay
    pub async fn current_frame(&self) -> Option<Frame> {
        let (engine, snapshot) = {
            let replay = self.replay.read().await;
            let replay = replay.as_ref()?;
            (Arc::clone(replay.engine()), replay.clock().snapshot())
        };
        Some(Frame::capture(&engine, snapshot))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

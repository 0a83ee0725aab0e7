//! Replay state: one loaded session, its query engine and the playback clock
//!
//! The clock is the only mutable part of a replay. The engine is immutable
//! and shared, so frames can be built outside any lock from a clock
//! snapshot.

use gp_core::model::SessionKind;
use gp_core::{
    CarState, ClockSnapshot, FieldMask, GapToLeader, PlaybackClock, PlaybackState, QueryEngine,
    Selection, Session,
};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Every selected car at one playback instant
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub cursor: f64,
    pub state: PlaybackState,
    pub rate: f64,
    pub cars: BTreeMap<String, CarState>,
    pub gaps: Vec<GapToLeader>,
}

impl Frame {
    /// Query `engine` at the snapshot's cursor
    pub fn capture(engine: &QueryEngine, clock: ClockSnapshot) -> Self {
        Self {
            cursor: clock.cursor,
            state: clock.state,
            rate: clock.rate,
            cars: engine.query(clock.cursor),
            gaps: engine.gap_to_leader(clock.cursor),
        }
    }

    /// Serialize with each car filtered through `mask`
    pub fn to_json_filtered(&self, mask: Option<&FieldMask>) -> serde_json::Result<serde_json::Value> {
        let mut cars = serde_json::Map::new();
        for (code, car) in &self.cars {
            cars.insert(code.clone(), car.to_json_filtered(mask)?);
        }
        Ok(serde_json::json!({
            "cursor": self.cursor,
            "state": self.state,
            "rate": self.rate,
            "cars": cars,
            "gaps": self.gaps,
        }))
    }

    /// Clock has stopped advancing (auto-paused at a bound or paused)
    pub fn is_final(&self) -> bool {
        self.state != PlaybackState::Playing
    }
}

/// Transport controls applied to the clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Toggle,
    Seek(f64),
    SetRate(f64),
    Faster,
    Slower,
}

/// State for an active replay
pub struct ReplayState {
    engine: Arc<QueryEngine>,
    clock: PlaybackClock,
    replay_id: String,
}

impl ReplayState {
    pub fn new(engine: QueryEngine) -> Self {
        let clock = engine.clock();
        let replay_id = replay_id(engine.session());
        Self {
            engine: Arc::new(engine),
            clock,
            replay_id,
        }
    }

    pub fn from_session(session: Arc<Session>, selection: Selection) -> Self {
        Self::new(QueryEngine::with_selection(session, selection))
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn replay_id(&self) -> &str {
        &self.replay_id
    }

    pub fn apply(&mut self, command: PlaybackCommand) -> ClockSnapshot {
        match command {
            PlaybackCommand::Play => self.clock.play(),
            PlaybackCommand::Pause => self.clock.pause(),
            PlaybackCommand::Toggle => self.clock.toggle(),
            PlaybackCommand::Seek(time) => self.clock.seek(time),
            PlaybackCommand::SetRate(rate) => self.clock.set_rate(rate),
            PlaybackCommand::Faster => self.clock.faster(),
            PlaybackCommand::Slower => self.clock.slower(),
        }
        self.clock.snapshot()
    }

    /// Advance the clock by `dt` wall seconds
    pub fn tick(&mut self, dt: f64) -> ClockSnapshot {
        self.clock.tick(dt);
        self.clock.snapshot()
    }

    /// Swap in a new driver/lap selection, keeping the cursor where possible.
    pub fn select(&mut self, selection: Selection) {
        let engine = QueryEngine::with_selection(Arc::clone(self.engine.session()), selection);
        self.clock.set_max_time(engine.session_max_time());
        self.engine = Arc::new(engine);
    }

    /// Frame at the current cursor
    pub fn frame(&self) -> Frame {
        Frame::capture(&self.engine, self.clock.snapshot())
    }

    pub fn info(&self) -> ReplayInfo {
        let session = self.engine.session();
        let drivers = session
            .drivers()
            .iter()
            .filter(|driver| self.engine.index().driver(driver.code()).is_some())
            .map(|driver| DriverSummary {
                code: driver.info.code.clone(),
                name: driver.info.name.clone(),
                number: driver.info.number,
                team: driver.info.team.clone(),
                team_color: driver.info.team_color.to_hex(),
                laps: driver.laps().len(),
            })
            .collect();

        ReplayInfo {
            replay_id: self.replay_id.clone(),
            title: session.title(),
            circuit: session.circuit.clone(),
            session_type: session.kind,
            date: session.date.to_rfc3339(),
            duration_secs: self.engine.session_max_time(),
            clock: self.clock.snapshot(),
            drivers,
        }
    }
}

/// Stable id from session metadata
fn replay_id(session: &Session) -> String {
    let mut hasher = DefaultHasher::new();
    session.title().hash(&mut hasher);
    session.driver_codes().hash(&mut hasher);
    session.sample_count().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverSummary {
    pub code: String,
    pub name: String,
    pub number: u32,
    pub team: String,
    pub team_color: String,
    pub laps: usize,
}

/// Serializable replay info
#[derive(Debug, Clone, Serialize)]
pub struct ReplayInfo {
    pub replay_id: String,
    pub title: String,
    pub circuit: String,
    pub session_type: SessionKind,
    pub date: String,
    pub duration_secs: f64,
    pub clock: ClockSnapshot,
    /// Selected drivers only
    pub drivers: Vec<DriverSummary>,
}

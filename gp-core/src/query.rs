//! Session query engine
//!
//! Answers "where is every car at playback time T". Each driver's laps are
//! played back to back in lap-number order; the engine resolves T to the
//! current lap and a lap-local time, finds the bracketing samples and
//! interpolates between them.
//!
//! The engine is immutable once built. `query` only reads, so one engine
//! can be shared behind an `Arc` and queried from several threads at once.

use crate::clock::PlaybackClock;
use crate::interpolation::interpolate_bracket;
use crate::model::{CarState, Session};
use crate::timeline::{find_bracket, DriverTimeline, TimelineIndex};
use crate::units::Seconds;
use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which drivers and laps take part in playback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    drivers: Option<HashSet<String>>,
    laps: Option<RangeInclusive<u32>>,
}

impl Selection {
    /// Every driver, every lap
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict playback to the given driver codes
    pub fn drivers<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drivers = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict playback to a range of lap numbers
    pub fn laps(mut self, range: RangeInclusive<u32>) -> Self {
        self.laps = Some(range);
        self
    }

    pub fn includes_driver(&self, code: &str) -> bool {
        self.drivers
            .as_ref()
            .map(|codes| codes.contains(code))
            .unwrap_or(true)
    }

    pub fn includes_lap(&self, number: u32) -> bool {
        self.laps
            .as_ref()
            .map(|range| range.contains(&number))
            .unwrap_or(true)
    }

    pub fn driver_codes(&self) -> Option<&HashSet<String>> {
        self.drivers.as_ref()
    }
}

pub struct QueryEngine {
    session: Arc<Session>,
    selection: Selection,
    index: TimelineIndex,
    max_time: f64,
}

impl QueryEngine {
    pub fn new(session: Arc<Session>) -> Self {
        Self::with_selection(session, Selection::all())
    }

    pub fn with_selection(session: Arc<Session>, selection: Selection) -> Self {
        if let Some(codes) = selection.driver_codes() {
            for code in codes {
                if session.driver(code).is_none() {
                    warn!("Selected driver {} is not in session {}", code, session.title());
                }
            }
        }

        let index = TimelineIndex::build(&session, &selection);
        let max_time = index.session_max_time();
        debug!(
            "Built timeline index for {} drivers, session max time {:.3}s",
            index.drivers().len(),
            max_time
        );

        Self {
            session,
            selection,
            index,
            max_time,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn index(&self) -> &TimelineIndex {
        &self.index
    }

    /// End of the longest selected driver timeline
    pub fn session_max_time(&self) -> f64 {
        self.max_time
    }

    /// A stopped clock bounded to this engine's selection
    pub fn clock(&self) -> PlaybackClock {
        PlaybackClock::new(self.max_time)
    }

    /// State of every selected car at `time`, keyed by driver code.
    ///
    /// Drivers that have run out of laps are reported frozen on their last
    /// sample with `finished` set.
    pub fn query(&self, time: f64) -> BTreeMap<String, CarState> {
        self.index
            .drivers()
            .iter()
            .map(|timeline| (timeline.code.clone(), self.car_state(timeline, time)))
            .collect()
    }

    /// State of one car at `time`; `None` if the driver is not selected.
    pub fn state_at(&self, code: &str, time: f64) -> Option<CarState> {
        self.index
            .driver(code)
            .map(|timeline| self.car_state(timeline, time))
    }

    pub(crate) fn car_state(&self, timeline: &DriverTimeline, time: f64) -> CarState {
        let cursor = timeline.resolve(time);
        let span = &timeline.spans()[cursor.span];
        let lap = &self.session.drivers()[timeline.driver].laps()[span.lap];

        let sample_time = span.first_time + cursor.local_time;
        let bracket = find_bracket(lap.samples(), sample_time);
        let state = interpolate_bracket(lap.samples(), bracket, sample_time);

        CarState {
            driver: timeline.code.clone(),
            lap: span.number,
            lap_time: Seconds(cursor.local_time),
            elapsed: Seconds(span.start + cursor.local_time),
            finished: cursor.finished,
            state,
        }
    }
}

//! Derived timing analytics: running order, gap to leader, lap and sector
//! deltas against a driver's best.

use crate::model::{Driver, Lap};
use crate::query::QueryEngine;
use crate::timeline::{DriverTimeline, LapCursor};
use crate::units::Seconds;
use serde::Serialize;
use std::cmp::Ordering;

/// One row of the running order at a playback time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapToLeader {
    pub driver: String,
    /// 1-based position
    pub rank: usize,
    pub lap: u32,
    /// Lap number minus one plus the fraction of the current lap. This
    /// counts lap numbers, not laps played: a lap dropped from the document
    /// still counts as completed.
    pub progress: f64,
    /// Leader progress minus this driver's progress
    pub laps_behind: f64,
    /// Elapsed time minus the time the leader needed to reach the same
    /// progress; `None` when the leader never ran that lap
    pub time_gap: Option<Seconds>,
}

/// Race distance in laps, keyed on lap numbers so drivers stay comparable
/// when one of them has gaps in their lap sequence.
fn progress(timeline: &DriverTimeline, cursor: &LapCursor) -> f64 {
    let span = &timeline.spans()[cursor.span];
    if cursor.finished {
        return span.number as f64;
    }
    let fraction = if span.duration > 0.0 {
        (cursor.local_time / span.duration).clamp(0.0, 1.0)
    } else {
        1.0
    };
    (span.number - 1) as f64 + fraction
}

/// Playback time at which `timeline` reached `progress`
fn time_at_progress(timeline: &DriverTimeline, progress: f64) -> Option<f64> {
    let completed = progress.floor();
    let fraction = progress - completed;
    let number = completed as u32 + 1;

    match timeline.span_for_lap(number) {
        Some(span) => Some(span.start + fraction * span.duration),
        None if fraction == 0.0 && completed >= 1.0 => {
            timeline.span_for_lap(completed as u32).map(|span| span.end())
        }
        None => None,
    }
}

/// Difference between a lap's time and the driver's best valid lap time
pub fn delta_to_best_lap(driver: &Driver, lap: &Lap) -> Option<Seconds> {
    let best = driver.best_lap()?.lap_time?;
    Some(lap.lap_time? - best)
}

/// Per-sector difference to the driver's best valid sector times
pub fn sector_deltas(driver: &Driver, lap: &Lap) -> [Option<Seconds>; 3] {
    let best = driver.best_sectors();
    let mut deltas = [None; 3];
    for (i, delta) in deltas.iter_mut().enumerate() {
        if let (Some(time), Some(best)) = (lap.sector_times[i], best[i]) {
            *delta = Some(time - best);
        }
    }
    deltas
}

impl QueryEngine {
    /// Running order at `time`, leader first.
    pub fn gap_to_leader(&self, time: f64) -> Vec<GapToLeader> {
        let mut rows: Vec<(&DriverTimeline, LapCursor, f64)> = self
            .index()
            .drivers()
            .iter()
            .map(|timeline| {
                let cursor = timeline.resolve(time);
                let progress = progress(timeline, &cursor);
                (timeline, cursor, progress)
            })
            .collect();

        rows.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.code.cmp(&b.0.code))
        });

        let Some(&(leader, _, leader_progress)) = rows.first() else {
            return Vec::new();
        };

        rows.iter()
            .enumerate()
            .map(|(i, (timeline, cursor, progress))| {
                let span = &timeline.spans()[cursor.span];
                let elapsed = span.start + cursor.local_time;
                let time_gap = if i == 0 {
                    Some(Seconds(0.0))
                } else {
                    time_at_progress(leader, *progress).map(|t| Seconds(elapsed - t))
                };

                GapToLeader {
                    driver: timeline.code.clone(),
                    rank: i + 1,
                    lap: span.number,
                    progress: *progress,
                    laps_behind: leader_progress - progress,
                    time_gap,
                }
            })
            .collect()
    }

    /// `lap_time - best valid lap_time` for one of a driver's laps
    pub fn delta_to_best_lap(&self, code: &str, lap_number: u32) -> Option<Seconds> {
        let driver = self.session().driver(code)?;
        delta_to_best_lap(driver, driver.lap(lap_number)?)
    }

    pub fn sector_deltas(&self, code: &str, lap_number: u32) -> [Option<Seconds>; 3] {
        self.session()
            .driver(code)
            .and_then(|driver| driver.lap(lap_number).map(|lap| sector_deltas(driver, lap)))
            .unwrap_or([None; 3])
    }
}

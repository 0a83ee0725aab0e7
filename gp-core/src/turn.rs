//! Turn definitions and lap comparison through a turn.
//!
//! A turn is a bounding area on the ground plane split into approach, apex
//! and exit boxes. The ground plane is made of position components `x` and
//! `z`; `y` is elevation in the stored axis order.

use crate::model::{Lap, Sample, Vector3};
use crate::units::{Meters, Seconds};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Axis-aligned box on the ground plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl BoundingBox {
    pub fn new(min_x: f32, max_x: f32, min_z: f32, max_z: f32) -> Self {
        Self {
            min_x,
            max_x,
            min_z,
            max_z,
        }
    }

    /// Create from two opposite corners in any order.
    pub fn from_corners(a: Vector3<Meters>, b: Vector3<Meters>) -> Self {
        Self {
            min_x: a.x.0.min(b.x.0),
            max_x: a.x.0.max(b.x.0),
            min_z: a.z.0.min(b.z.0),
            max_z: a.z.0.max(b.z.0),
        }
    }

    /// Elevation is ignored.
    pub fn contains(&self, pos: &Vector3<Meters>) -> bool {
        pos.x.0 >= self.min_x && pos.x.0 <= self.max_x && pos.z.0 >= self.min_z && pos.z.0 <= self.max_z
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnSegment {
    Approach,
    Apex,
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Turn identifier (e.g., "T1", "Maggots")
    pub name: String,
    pub bounds: BoundingBox,
    pub approach: BoundingBox,
    pub apex: BoundingBox,
    pub exit: BoundingBox,
}

impl Turn {
    /// Samples inside the overall turn bounds
    pub fn filter_samples<'a>(&self, samples: &'a [Sample]) -> Vec<&'a Sample> {
        samples
            .iter()
            .filter(|s| self.bounds.contains(&s.position))
            .collect()
    }

    pub fn filter_segment<'a>(&self, samples: &'a [Sample], segment: TurnSegment) -> Vec<&'a Sample> {
        let bounds = self.segment_bounds(segment);
        samples
            .iter()
            .filter(|s| bounds.contains(&s.position))
            .collect()
    }

    /// Segment containing `pos`, checked in approach/apex/exit order
    pub fn classify_position(&self, pos: &Vector3<Meters>) -> Option<TurnSegment> {
        [TurnSegment::Approach, TurnSegment::Apex, TurnSegment::Exit]
            .into_iter()
            .find(|segment| self.segment_bounds(*segment).contains(pos))
    }

    fn segment_bounds(&self, segment: TurnSegment) -> &BoundingBox {
        match segment {
            TurnSegment::Approach => &self.approach,
            TurnSegment::Apex => &self.apex,
            TurnSegment::Exit => &self.exit,
        }
    }
}

/// Turn definitions for one circuit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitTurns {
    pub circuit: String,
    pub turns: Vec<Turn>,
}

impl CircuitTurns {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn get_turn(&self, name: &str) -> Option<&Turn> {
        self.turns.iter().find(|t| t.name == name)
    }
}

/// Time and speeds through a turn or segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentTime {
    pub time: Seconds,
    /// km/h
    pub entry_speed: u16,
    pub min_speed: u16,
    pub exit_speed: u16,
}

impl SegmentTime {
    /// Needs at least two samples to measure a duration.
    fn measure(samples: &[&Sample]) -> Option<Self> {
        if samples.len() < 2 {
            return None;
        }
        let first = samples.first()?;
        let last = samples.last()?;

        Some(Self {
            time: last.time - first.time,
            entry_speed: first.speed,
            min_speed: samples.iter().map(|s| s.speed).min().unwrap_or(0),
            exit_speed: last.speed,
        })
    }
}

/// One lap through one turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnAnalysis {
    pub lap_number: u32,
    pub total: Option<SegmentTime>,
    pub approach: Option<SegmentTime>,
    pub apex: Option<SegmentTime>,
    pub exit: Option<SegmentTime>,
}

impl TurnAnalysis {
    pub fn analyze(lap: &Lap, turn: &Turn) -> Self {
        let samples = lap.samples();
        Self {
            lap_number: lap.number,
            total: SegmentTime::measure(&turn.filter_samples(samples)),
            approach: SegmentTime::measure(&turn.filter_segment(samples, TurnSegment::Approach)),
            apex: SegmentTime::measure(&turn.filter_segment(samples, TurnSegment::Apex)),
            exit: SegmentTime::measure(&turn.filter_segment(samples, TurnSegment::Exit)),
        }
    }
}

/// Best lap number per segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentBests {
    pub approach: Option<u32>,
    pub apex: Option<u32>,
    pub exit: Option<u32>,
}

/// Several laps compared through one turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnComparison {
    pub turn_name: String,
    /// Fastest first; laps that never entered the turn are left out
    pub analyses: Vec<TurnAnalysis>,
    /// The fastest lap through the turn also wins every segment
    pub uniform_fastest: bool,
    pub segment_bests: SegmentBests,
}

impl TurnComparison {
    pub fn compare<'a>(laps: impl IntoIterator<Item = &'a Lap>, turn: &Turn) -> Self {
        let mut analyses: Vec<TurnAnalysis> = laps
            .into_iter()
            .map(|lap| TurnAnalysis::analyze(lap, turn))
            .filter(|a| a.total.is_some())
            .collect();

        let total_time = |a: &TurnAnalysis| a.total.map(|t| t.time.0).unwrap_or(f64::MAX);
        analyses.sort_by(|a, b| {
            total_time(a)
                .partial_cmp(&total_time(b))
                .unwrap_or(Ordering::Equal)
        });

        let segment_bests = SegmentBests {
            approach: best_for(&analyses, |a| a.approach),
            apex: best_for(&analyses, |a| a.apex),
            exit: best_for(&analyses, |a| a.exit),
        };

        let uniform_fastest = analyses.first().is_some_and(|fastest| {
            let lap = fastest.lap_number;
            [segment_bests.approach, segment_bests.apex, segment_bests.exit]
                .iter()
                .all(|best| best.map_or(true, |l| l == lap))
        });

        Self {
            turn_name: turn.name.clone(),
            analyses,
            uniform_fastest,
            segment_bests,
        }
    }
}

fn best_for(analyses: &[TurnAnalysis], segment: fn(&TurnAnalysis) -> Option<SegmentTime>) -> Option<u32> {
    analyses
        .iter()
        .filter_map(|a| segment(a).map(|s| (a.lap_number, s.time.0)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(lap, _)| lap)
}

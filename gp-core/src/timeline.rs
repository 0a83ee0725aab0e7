//! Timeline index
//!
//! Lookup structures over an immutable [`Session`]: a binary search over a
//! lap's samples to find the pair bracketing a time, and a per-driver table
//! of cumulative lap start times so that one shared playback time can be
//! resolved to (lap, lap-local time) for every car.
//!
//! The index stores positions into the session tree, never samples.

use crate::model::{Driver, Sample, Session};
use crate::query::Selection;

/// Pair of adjacent recorded samples surrounding a query time.
///
/// `lower == upper` when the time hits a sample exactly or falls outside the
/// lap (clamped to the first or last sample).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub lower: usize,
    pub upper: usize,
}

impl Bracket {
    fn exact(index: usize) -> Self {
        Self {
            lower: index,
            upper: index,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.lower == self.upper
    }
}

/// Find the samples bracketing `time` in a non-empty, time-ordered slice.
///
/// O(log n). Times before the first sample clamp to it, times after the
/// last clamp to the last one.
pub fn find_bracket(samples: &[Sample], time: f64) -> Bracket {
    debug_assert!(!samples.is_empty(), "laps never hold zero samples");
    let last = samples.len().saturating_sub(1);

    if time.is_nan() || samples.is_empty() || time <= samples[0].time.0 {
        return Bracket::exact(0);
    }
    if time >= samples[last].time.0 {
        return Bracket::exact(last);
    }

    // First sample at or after `time`; strictly inside (0, last] here.
    let upper = samples.partition_point(|s| s.time.0 < time);
    if samples[upper].time.0 == time {
        Bracket::exact(upper)
    } else {
        Bracket {
            lower: upper - 1,
            upper,
        }
    }
}

/// One lap placed on a driver's cumulative playback timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapSpan {
    /// Index into `Driver::laps()`
    pub lap: usize,
    pub number: u32,
    /// Cumulative playback time at which this lap starts
    pub start: f64,
    /// Lap-local duration (last sample minus first sample)
    pub duration: f64,
    /// Session time of the lap's first sample
    pub first_time: f64,
}

impl LapSpan {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A driver's current lap for a given playback time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapCursor {
    /// Index into `DriverTimeline::spans()`
    pub span: usize,
    /// Time since the lap's first sample
    pub local_time: f64,
    /// Playback time is past the driver's last lap
    pub finished: bool,
}

/// Laps of one driver laid end to end in lap-number order
#[derive(Debug, Clone)]
pub struct DriverTimeline {
    /// Index into `Session::drivers()`
    pub driver: usize,
    pub code: String,
    spans: Vec<LapSpan>,
}

impl DriverTimeline {
    fn build(index: usize, driver: &Driver, selection: &Selection) -> Option<Self> {
        let mut start = 0.0;
        let spans: Vec<LapSpan> = driver
            .laps()
            .iter()
            .enumerate()
            .filter(|(_, lap)| selection.includes_lap(lap.number))
            .map(|(i, lap)| {
                let span = LapSpan {
                    lap: i,
                    number: lap.number,
                    start,
                    duration: lap.duration().0,
                    first_time: lap.first_time().0,
                };
                start += span.duration;
                span
            })
            .collect();

        if spans.is_empty() {
            return None;
        }
        Some(Self {
            driver: index,
            code: driver.code().to_string(),
            spans,
        })
    }

    pub fn spans(&self) -> &[LapSpan] {
        &self.spans
    }

    /// Sum of all lap durations
    pub fn total_duration(&self) -> f64 {
        self.spans.last().map(LapSpan::end).unwrap_or(0.0)
    }

    /// Span holding the given lap number
    pub fn span_for_lap(&self, number: u32) -> Option<&LapSpan> {
        self.spans
            .binary_search_by_key(&number, |s| s.number)
            .ok()
            .map(|i| &self.spans[i])
    }

    /// Resolve a playback time to the current lap and lap-local time.
    ///
    /// Boundary times belong to the later lap. Past the end, the driver is
    /// frozen on the final sample of the last lap.
    pub fn resolve(&self, time: f64) -> LapCursor {
        let last = self.spans.len() - 1;

        if time.is_nan() || time <= 0.0 {
            return LapCursor {
                span: 0,
                local_time: 0.0,
                finished: false,
            };
        }
        if time > self.total_duration() {
            return LapCursor {
                span: last,
                local_time: self.spans[last].duration,
                finished: true,
            };
        }

        let span = self
            .spans
            .partition_point(|s| s.start <= time)
            .saturating_sub(1);
        let local_time = (time - self.spans[span].start).clamp(0.0, self.spans[span].duration);

        LapCursor {
            span,
            local_time,
            finished: false,
        }
    }
}

/// Per-driver timelines for every driver in a selection
#[derive(Debug, Clone)]
pub struct TimelineIndex {
    drivers: Vec<DriverTimeline>,
}

impl TimelineIndex {
    /// O(total laps): records lap offsets, relying on the loader's ordering.
    pub fn build(session: &Session, selection: &Selection) -> Self {
        let drivers = session
            .drivers()
            .iter()
            .enumerate()
            .filter(|(_, driver)| selection.includes_driver(driver.code()))
            .filter_map(|(i, driver)| DriverTimeline::build(i, driver, selection))
            .collect();

        Self { drivers }
    }

    pub fn drivers(&self) -> &[DriverTimeline] {
        &self.drivers
    }

    pub fn driver(&self, code: &str) -> Option<&DriverTimeline> {
        self.drivers.iter().find(|d| d.code == code)
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Playback time of the last selected sample of any driver.
    ///
    /// Selected laps play back to back from 0, so this is the longest
    /// driver timeline, not the largest recorded sample time.
    pub fn session_max_time(&self) -> f64 {
        self.drivers
            .iter()
            .map(DriverTimeline::total_duration)
            .fold(0.0, f64::max)
    }
}

//! Demo source that synthesizes a multi-driver session
//!
//! Simulates laps around a closed circuit with straights, braking zones,
//! corners, and acceleration phases, writes them out as a regular session
//! document and loads that through the real loader. Output is deterministic:
//! the same settings always produce the same session.

use crate::SessionSource;
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use gp_core::Session;
use serde_json::{json, Value};
use std::f64::consts::TAU;
use tracing::debug;

// =============================================================================
// Track definition: a sequence of segments that form a lap
// =============================================================================

#[derive(Clone, Copy, PartialEq)]
enum SegmentKind {
    Straight, // Full throttle, top speed
    Braking,  // Heavy braking into a corner
    Corner,   // Constant-ish speed cornering
    Accel,    // Accelerating out of a corner
}

#[derive(Clone, Copy)]
struct TrackSegment {
    kind: SegmentKind,
    duration: f64,     // seconds to traverse at reference pace
    target_speed: f64, // m/s at end of segment
    drs_zone: bool,
}

const fn segment(kind: SegmentKind, duration: f64, target_speed: f64) -> TrackSegment {
    TrackSegment {
        kind,
        duration,
        target_speed,
        drs_zone: false,
    }
}

const fn drs_straight(duration: f64, target_speed: f64) -> TrackSegment {
    TrackSegment {
        kind: SegmentKind::Straight,
        duration,
        target_speed,
        drs_zone: true,
    }
}

use SegmentKind::*;

/// A simple circuit: ~84s lap, mix of corners and straights
const DEMO_TRACK: [TrackSegment; 21] = [
    // Start/finish straight
    drs_straight(8.0, 75.0),
    // T1: heavy braking into slow right-hander
    segment(Braking, 3.0, 28.0),
    segment(Corner, 4.0, 25.0),
    segment(Accel, 3.5, 55.0),
    // Short straight
    segment(Straight, 4.0, 62.0),
    // T2: medium braking into fast left-hander
    segment(Braking, 2.0, 45.0),
    segment(Corner, 3.5, 42.0),
    segment(Accel, 3.0, 58.0),
    // Back straight
    drs_straight(10.0, 80.0),
    // T3: chicane
    segment(Braking, 2.5, 35.0),
    segment(Corner, 2.0, 32.0),
    segment(Corner, 2.0, 30.0),
    segment(Accel, 3.0, 50.0),
    // Medium straight
    segment(Straight, 6.0, 68.0),
    // T4: long sweeping right
    segment(Braking, 1.5, 52.0),
    segment(Corner, 5.0, 50.0),
    segment(Accel, 3.0, 60.0),
    // T5: tight hairpin left
    segment(Braking, 3.5, 22.0),
    segment(Corner, 4.5, 20.0),
    segment(Accel, 4.0, 55.0),
    // Run to start/finish
    segment(Straight, 6.0, 72.0),
];

/// First segment of sectors 2 and 3
const SECTOR_STARTS: [usize; 2] = [8, 14];

/// Raw DRS codes as found in timing feeds
const DRS_OPEN: i32 = 12;
const DRS_CLOSED: i32 = 0;

/// Producers record session-clock offsets, not lap-local times
const SESSION_CLOCK_START: f64 = 3_600.0;

fn reference_lap_time() -> f64 {
    DEMO_TRACK.iter().map(|s| s.duration).sum()
}

fn sector_boundaries() -> [f64; 2] {
    SECTOR_STARTS.map(|start| DEMO_TRACK[..start].iter().map(|s| s.duration).sum())
}

// =============================================================================
// Speed profile derived from track position
// =============================================================================

struct Profile {
    segment: usize,
    speed: f64,    // m/s
    throttle: f64, // 0-1
    brake: f64,    // 0-1
}

fn profile_at(t: f64) -> Profile {
    let mut start = 0.0;
    let mut idx = 0;
    for (i, seg) in DEMO_TRACK.iter().enumerate() {
        idx = i;
        if start + seg.duration > t || i + 1 == DEMO_TRACK.len() {
            break;
        }
        start += seg.duration;
    }

    let seg = DEMO_TRACK[idx];
    let seg_t = ((t - start) / seg.duration).clamp(0.0, 1.0);
    let prev = DEMO_TRACK[(idx + DEMO_TRACK.len() - 1) % DEMO_TRACK.len()];

    let smooth_t = smoothstep(seg_t);
    let speed = lerp(prev.target_speed, seg.target_speed, smooth_t);

    let (throttle, brake) = match seg.kind {
        Straight => (0.95 + 0.05 * (1.0 - seg_t), 0.0),
        Braking => (0.0, (1.0 - smooth_t * 0.3).clamp(0.0, 1.0)),
        Corner => (0.2 + 0.3 * seg_t, 0.0),
        Accel => (0.5 + 0.5 * smooth_t, 0.0),
    };

    Profile {
        segment: idx,
        speed,
        throttle,
        brake,
    }
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn speed_to_gear(speed_ms: f64) -> i8 {
    let kph = speed_ms * 3.6;
    match kph {
        x if x < 80.0 => 1,
        x if x < 110.0 => 2,
        x if x < 140.0 => 3,
        x if x < 170.0 => 4,
        x if x < 200.0 => 5,
        x if x < 240.0 => 6,
        x if x < 280.0 => 7,
        _ => 8,
    }
}

/// Closed circuit outline on the ground plane at lap fraction `theta`
fn circuit_position(theta: f64) -> [f64; 3] {
    let x = 1_200.0 * theta.cos() + 150.0 * (3.0 * theta).cos();
    let z = 700.0 * theta.sin() + 100.0 * (2.0 * theta).sin();
    let elevation = 4.0 * theta.sin();
    [x, elevation, z]
}

/// Simple deterministic noise from a seed
fn noise(seed: f64) -> f64 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f64, amplitude: f64) -> f64 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

// =============================================================================
// Driver roster
// =============================================================================

struct RosterEntry {
    code: &'static str,
    name: &'static str,
    number: u32,
    team: &'static str,
    team_color: &'static str,
}

const ROSTER: [RosterEntry; 10] = [
    RosterEntry { code: "RIV", name: "Alex Rivera", number: 7, team: "Apex Racing", team_color: "#E10600" },
    RosterEntry { code: "CHE", name: "Sam Chen", number: 22, team: "Velocity Motorsport", team_color: "#0090FF" },
    RosterEntry { code: "OKA", name: "Ren Okafor", number: 3, team: "Apex Racing", team_color: "#E10600" },
    RosterEntry { code: "LIN", name: "Mika Lindqvist", number: 11, team: "Velocity Motorsport", team_color: "#0090FF" },
    RosterEntry { code: "SOU", name: "Dani Sousa", number: 18, team: "Northline GP", team_color: "#00A19C" },
    RosterEntry { code: "HAR", name: "Jo Hartmann", number: 27, team: "Northline GP", team_color: "#00A19C" },
    RosterEntry { code: "TAN", name: "Kai Tanaka", number: 31, team: "Redwood Racing", team_color: "#FF8000" },
    RosterEntry { code: "MOR", name: "Noa Moreau", number: 44, team: "Redwood Racing", team_color: "#FF8000" },
    RosterEntry { code: "PAT", name: "Ash Patel", number: 55, team: "Team Demo", team_color: "#6CD3BF" },
    RosterEntry { code: "DEM", name: "Demo Player", number: 42, team: "Team Demo", team_color: "#6CD3BF" },
];

// =============================================================================
// DemoSource
// =============================================================================

pub struct DemoSource {
    drivers: usize,
    laps: u32,
    sample_rate_hz: f64,
    date: DateTime<Utc>,
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoSource {
    /// Largest number of drivers the demo can field
    pub const MAX_DRIVERS: usize = ROSTER.len();

    pub fn new() -> Self {
        Self {
            drivers: 6,
            laps: 3,
            sample_rate_hz: 10.0,
            // 2025-10-19T19:00:00Z
            date: DateTime::from_timestamp(1_760_900_400, 0).unwrap_or_default(),
        }
    }

    /// Number of drivers, clamped to `1..=MAX_DRIVERS`
    pub fn with_drivers(mut self, drivers: usize) -> Self {
        self.drivers = drivers.clamp(1, Self::MAX_DRIVERS);
        self
    }

    pub fn with_laps(mut self, laps: u32) -> Self {
        self.laps = laps.max(1);
        self
    }

    /// Samples per second, clamped to `1..=100`. Non-finite values are ignored.
    pub fn with_sample_rate(mut self, hz: f64) -> Self {
        if hz.is_finite() {
            self.sample_rate_hz = hz.clamp(1.0, 100.0);
        }
        self
    }

    pub fn driver_count(&self) -> usize {
        self.drivers
    }

    pub fn lap_count(&self) -> u32 {
        self.laps
    }

    /// The session document this source loads
    pub fn document(&self) -> Value {
        let drivers: Vec<Value> = ROSTER
            .iter()
            .take(self.drivers)
            .enumerate()
            .map(|(index, entry)| self.driver_document(index, entry))
            .collect();

        json!({
            "year": self.date.year(),
            "circuit": "Demo Circuit Grand Prix",
            "circuit_short": "Demo",
            "session_type": "Race",
            "date": self.date.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "drivers": drivers
        })
    }

    fn driver_document(&self, index: usize, entry: &RosterEntry) -> Value {
        let mut start = SESSION_CLOCK_START;
        let laps: Vec<Value> = (1..=self.laps)
            .map(|number| {
                let (lap, lap_time) = self.lap_document(index, number, start);
                start += lap_time;
                lap
            })
            .collect();

        json!({
            "driver": {
                "code": entry.code,
                "name": entry.name,
                "number": entry.number,
                "team": entry.team,
                "team_color": entry.team_color
            },
            "laps": laps
        })
    }

    /// One lap starting at session time `start`; returns the document and
    /// the lap time.
    fn lap_document(&self, driver: usize, number: u32, start: f64) -> (Value, f64) {
        let seed = (driver * 1_000 + number as usize) as f64;
        let pace = 1.0 + driver as f64 * 0.004 + jitter(seed, 0.003).abs();
        let lap_time = reference_lap_time() * pace;

        let dt = 1.0 / self.sample_rate_hz;
        let steps = (lap_time / dt).ceil() as usize;
        let times: Vec<f64> = (0..=steps).map(|i| (i as f64 * dt).min(lap_time)).collect();
        let profiles: Vec<Profile> = times.iter().map(|t| profile_at(t / pace)).collect();

        // Distance along the lap, normalized so every lap closes the loop
        let mut distance = vec![0.0; times.len()];
        for i in 1..times.len() {
            let v = (profiles[i - 1].speed + profiles[i].speed) / (2.0 * pace);
            distance[i] = distance[i - 1] + v * (times[i] - times[i - 1]);
        }
        let total = distance.last().copied().filter(|d| *d > 0.0).unwrap_or(1.0);

        let samples: Vec<Value> = times
            .iter()
            .zip(&profiles)
            .zip(&distance)
            .enumerate()
            .map(|(i, ((t, profile), d))| {
                let n = seed * 7.0 + i as f64;
                let [x, y, z] = circuit_position(TAU * d / total);
                let speed = (profile.speed / pace + jitter(n, 0.3)).max(0.0);
                let throttle = (profile.throttle + jitter(n * 1.2, 0.02)).clamp(0.0, 1.0);
                let brake = (profile.brake + jitter(n * 1.3, 0.02)).clamp(0.0, 1.0);
                let drs_open = number > 1 && DEMO_TRACK[profile.segment].drs_zone;

                json!({
                    "position": [x + jitter(n * 1.4, 0.3), y, z + jitter(n * 1.5, 0.3)],
                    "time": start + t,
                    "throttle": (throttle * 100.0).round() as u8,
                    "brake": (brake * 100.0).round() as u8,
                    "gear": speed_to_gear(speed),
                    "speed": (speed * 3.6).round() as u16,
                    "drs": if drs_open { DRS_OPEN } else { DRS_CLOSED }
                })
            })
            .collect();

        let [s1, s2] = sector_boundaries();
        let sector_times = [s1 * pace, (s2 - s1) * pace, (reference_lap_time() - s2) * pace];
        // Occasional track-limits violation
        let is_valid = number == 1 || noise(seed * 1.7) < 0.85;

        let lap = json!({
            "number": number,
            "lap_time": lap_time,
            "sector_times": sector_times,
            "is_valid": is_valid,
            "samples": samples
        });
        (lap, lap_time)
    }
}

impl SessionSource for DemoSource {
    fn name(&self) -> &str {
        "Demo"
    }

    fn load(&self) -> Result<Session> {
        let bytes =
            serde_json::to_vec(&self.document()).context("Failed to encode demo session document")?;
        let session = gp_core::load(&bytes).context("Demo session document failed to load")?;
        debug!(
            "Generated demo session with {} drivers x {} laps ({} samples)",
            self.drivers,
            self.laps,
            session.sample_count()
        );
        Ok(session)
    }
}

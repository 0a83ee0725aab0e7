//! Session telemetry data model
//!
//! A loaded session is a strict ownership tree: `Session` owns its
//! `Driver`s, each `Driver` owns its `Lap`s, each `Lap` owns its `Sample`s.
//! The tree is built once by the loader and never mutated afterwards, so it
//! can be shared between threads behind an `Arc` without locking.
//!
//! Coordinate system: positions are an opaque 3-vector `[X, Z, Y]` in the
//! producer's axes (already permuted for a left-handed, Y-up consumer).
//! Nothing in this crate re-permutes them.

use crate::units::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// 3D vector with typed components
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Vector3<T> {
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl Vector3<Meters> {
    pub fn from_array([x, y, z]: [f32; 3]) -> Self {
        Self::new(Meters(x), Meters(y), Meters(z))
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.x.0, self.y.0, self.z.0]
    }

    /// Per-axis linear interpolation towards `other`
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self::new(
            Meters(lerp(self.x.0, other.x.0, t)),
            Meters(lerp(self.y.0, other.y.0, t)),
            Meters(lerp(self.z.0, other.z.0, t)),
        )
    }
}

/// DRS state, collapsed to binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrsState {
    #[default]
    Off,
    Active,
}

impl DrsState {
    /// Raw codes above this value mean the flap is open
    pub const ACTIVE_THRESHOLD: i32 = 10;

    /// Collapse a raw timing-feed DRS code into the binary state.
    ///
    /// The intermediate "detected"/"available" codes map to `Off`.
    pub fn from_raw_code(code: i32) -> Self {
        if code > Self::ACTIVE_THRESHOLD {
            DrsState::Active
        } else {
            DrsState::Off
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, DrsState::Active)
    }
}

/// One recorded telemetry instant for a car
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Opaque world position `[X, Z, Y]`
    pub position: Vector3<Meters>,
    /// Session-relative timestamp, normalized so the session starts at 0
    pub time: Seconds,
    /// Throttle application (0-100)
    pub throttle: u8,
    /// Brake application (0-100; binary feeds use 0/1 or 0/100)
    pub brake: u8,
    /// -1 = reverse, 0 = neutral, 1..8 = forward gears
    pub gear: i8,
    /// Speed in km/h
    pub speed: u16,
    pub drs: DrsState,
}

/// A lap with its telemetry samples.
///
/// Samples are strictly increasing in time and never empty.
#[derive(Debug, Clone, Serialize)]
pub struct Lap {
    /// Lap number (1-indexed)
    pub number: u32,
    /// Official lap time (None if not recorded)
    pub lap_time: Option<Seconds>,
    /// Sector times [S1, S2, S3]
    pub sector_times: [Option<Seconds>; 3],
    /// Invalid laps still play back but never count as a best lap
    pub is_valid: bool,
    samples: Vec<Sample>,
}

impl Lap {
    /// Build a lap, ordering samples by time and dropping repeated
    /// timestamps (first one wins). Returns `None` for an empty lap.
    pub fn new(
        number: u32,
        lap_time: Option<Seconds>,
        sector_times: [Option<Seconds>; 3],
        is_valid: bool,
        mut samples: Vec<Sample>,
    ) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(|a, b| a.time.0.total_cmp(&b.time.0));
        samples.dedup_by(|later, earlier| later.time == earlier.time);

        Some(Self {
            number,
            lap_time,
            sector_times,
            is_valid,
            samples,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn first_sample(&self) -> &Sample {
        &self.samples[0]
    }

    pub fn last_sample(&self) -> &Sample {
        &self.samples[self.samples.len() - 1]
    }

    pub fn first_time(&self) -> Seconds {
        self.first_sample().time
    }

    pub fn last_time(&self) -> Seconds {
        self.last_sample().time
    }

    /// Lap-local playback duration (last sample minus first sample)
    pub fn duration(&self) -> Seconds {
        self.last_time() - self.first_time()
    }

    /// Lap time if this lap is eligible for best-lap comparisons
    pub fn timed(&self) -> Option<Seconds> {
        if self.is_valid {
            self.lap_time
        } else {
            None
        }
    }

    pub(crate) fn shift_time(&mut self, offset: f64) {
        for sample in &mut self.samples {
            sample.time = Seconds(sample.time.0 - offset);
        }
    }
}

/// Team color (parsed from `#RRGGBB`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TeamColor {
    pub const WHITE: TeamColor = TeamColor {
        r: 0xFF,
        g: 0xFF,
        b: 0xFF,
    };

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for TeamColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| format!("team color '{}' must start with '#'", s))?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("team color '{}' is not #RRGGBB", s));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        Ok(TeamColor {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for TeamColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Driver information
#[derive(Debug, Clone, Serialize)]
pub struct DriverInfo {
    /// Three-letter abbreviation (e.g., "VER", "HAM"), unique per session
    pub code: String,
    /// Full display name
    pub name: String,
    /// Car number, unique per session
    pub number: u32,
    pub team: String,
    pub team_color: TeamColor,
}

/// A driver and all of their recorded laps, ordered by lap number
#[derive(Debug, Clone, Serialize)]
pub struct Driver {
    pub info: DriverInfo,
    laps: Vec<Lap>,
}

impl Driver {
    /// Returns `None` when the driver has no laps left to play.
    pub fn new(info: DriverInfo, mut laps: Vec<Lap>) -> Option<Self> {
        if laps.is_empty() {
            return None;
        }
        laps.sort_by_key(|lap| lap.number);
        Some(Self { info, laps })
    }

    pub fn code(&self) -> &str {
        &self.info.code
    }

    pub fn laps(&self) -> &[Lap] {
        &self.laps
    }

    pub fn lap(&self, number: u32) -> Option<&Lap> {
        self.laps
            .binary_search_by_key(&number, |lap| lap.number)
            .ok()
            .map(|i| &self.laps[i])
    }

    /// Fastest valid lap with a recorded lap time
    pub fn best_lap(&self) -> Option<&Lap> {
        self.laps
            .iter()
            .filter_map(|lap| lap.timed().map(|t| (lap, t)))
            .min_by(|a, b| a.1 .0.total_cmp(&b.1 .0))
            .map(|(lap, _)| lap)
    }

    /// Best recorded time for each sector over valid laps
    pub fn best_sectors(&self) -> [Option<Seconds>; 3] {
        let mut best = [None; 3];
        for lap in self.laps.iter().filter(|lap| lap.is_valid) {
            for (slot, sector) in best.iter_mut().zip(lap.sector_times) {
                if let Some(time) = sector {
                    match slot {
                        Some(current) if *current <= time => {}
                        _ => *slot = Some(time),
                    }
                }
            }
        }
        best
    }

    pub(crate) fn laps_mut(&mut self) -> &mut [Lap] {
        &mut self.laps
    }
}

/// Session type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    Practice1,
    Practice2,
    Practice3,
    Qualifying,
    Sprint,
    Race,
}

impl SessionKind {
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Practice1 => "FP1",
            Self::Practice2 => "FP2",
            Self::Practice3 => "FP3",
            Self::Qualifying => "Q",
            Self::Sprint => "Sprint",
            Self::Race => "Race",
        }
    }
}

/// Complete session for one race-weekend event
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub year: i32,
    pub circuit: String,
    pub circuit_short: String,
    pub kind: SessionKind,
    pub date: DateTime<Utc>,
    drivers: Vec<Driver>,
}

impl Session {
    /// Always holds at least one driver with at least one lap.
    pub(crate) fn new(
        year: i32,
        circuit: String,
        circuit_short: String,
        kind: SessionKind,
        date: DateTime<Utc>,
        drivers: Vec<Driver>,
    ) -> Self {
        Self {
            year,
            circuit,
            circuit_short,
            kind,
            date,
            drivers,
        }
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    /// Get a driver by their code.
    pub fn driver(&self, code: &str) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.info.code == code)
    }

    pub fn driver_codes(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.info.code.as_str()).collect()
    }

    pub fn lap_count(&self) -> usize {
        self.drivers.iter().map(|d| d.laps.len()).sum()
    }

    pub fn sample_count(&self) -> usize {
        self.drivers
            .iter()
            .flat_map(|d| d.laps.iter())
            .map(|lap| lap.samples.len())
            .sum()
    }

    /// Human-readable title, e.g. "2024 Austin Q"
    pub fn title(&self) -> String {
        format!("{} {} {}", self.year, self.circuit_short, self.kind.short_name())
    }
}

/// Telemetry state at an arbitrary time between two recorded samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterpolatedState {
    /// Sample-basis time the state was evaluated at
    pub time: Seconds,
    pub position: Vector3<Meters>,
    pub throttle: Percent,
    pub brake: Percent,
    pub speed: KilometersPerHour,
    pub gear: i8,
    pub drs: DrsState,
}

/// Where a car is on the shared playback timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarState {
    pub driver: String,
    /// Lap number being played
    pub lap: u32,
    /// Time since the first sample of the current lap
    pub lap_time: Seconds,
    /// Cumulative playback time for this driver (frozen once finished)
    pub elapsed: Seconds,
    /// The driver's last lap has been played out
    pub finished: bool,
    #[serde(flatten)]
    pub state: InterpolatedState,
}

// === Field Masking for Selective Output ===

/// Specifies which fields to include in serialized output
///
/// Sinks use this to keep frames small when a consumer only needs a few
/// channels.
#[derive(Debug, Clone, Default)]
pub struct FieldMask {
    fields: HashSet<String>,
    include_all: bool,
}

impl FieldMask {
    /// Create a mask that includes all fields
    pub fn all() -> Self {
        Self {
            fields: HashSet::new(),
            include_all: true,
        }
    }

    /// Create a mask from a comma-separated list of field names
    pub fn parse(fields: &str) -> Self {
        let fields: HashSet<String> = fields
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            fields,
            include_all: false,
        }
    }

    /// Create a builder for constructing masks
    pub fn builder() -> FieldMaskBuilder {
        FieldMaskBuilder::default()
    }

    /// Check if a field should be included
    pub fn includes(&self, field: &str) -> bool {
        self.include_all || self.fields.contains(&field.to_lowercase())
    }

    /// Check if all fields should be included
    pub fn is_all(&self) -> bool {
        self.include_all
    }
}

impl FromStr for FieldMask {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Builder for FieldMask
#[derive(Debug, Default)]
pub struct FieldMaskBuilder {
    fields: HashSet<String>,
}

impl FieldMaskBuilder {
    pub fn with_field(mut self, field: &str) -> Self {
        self.fields.insert(field.to_lowercase());
        self
    }

    pub fn position(self) -> Self {
        self.with_field("position")
    }

    pub fn speed(self) -> Self {
        self.with_field("speed")
    }

    pub fn gear(self) -> Self {
        self.with_field("gear")
    }

    pub fn throttle(self) -> Self {
        self.with_field("throttle")
    }

    pub fn brake(self) -> Self {
        self.with_field("brake")
    }

    pub fn drs(self) -> Self {
        self.with_field("drs")
    }

    pub fn build(self) -> FieldMask {
        FieldMask {
            fields: self.fields,
            include_all: false,
        }
    }
}

impl CarState {
    /// Serialize this car state respecting the given field mask
    ///
    /// `driver`, `lap` and `time` are always present so a consumer can
    /// place the values; everything else is only emitted when requested.
    pub fn to_json_filtered(&self, mask: Option<&FieldMask>) -> serde_json::Result<serde_json::Value> {
        let mask = match mask {
            Some(mask) if !mask.is_all() => mask,
            _ => return serde_json::to_value(self),
        };
        let mut map = serde_json::Map::new();

        map.insert("driver".to_string(), serde_json::to_value(&self.driver)?);
        map.insert("lap".to_string(), serde_json::to_value(self.lap)?);
        map.insert("time".to_string(), serde_json::to_value(self.state.time)?);

        if mask.includes("lap_time") {
            map.insert("lap_time".to_string(), serde_json::to_value(self.lap_time)?);
        }
        if mask.includes("elapsed") {
            map.insert("elapsed".to_string(), serde_json::to_value(self.elapsed)?);
        }
        if mask.includes("finished") {
            map.insert("finished".to_string(), serde_json::to_value(self.finished)?);
        }
        if mask.includes("position") {
            map.insert("position".to_string(), serde_json::to_value(self.state.position)?);
        }
        if mask.includes("throttle") {
            map.insert("throttle".to_string(), serde_json::to_value(self.state.throttle)?);
        }
        if mask.includes("brake") {
            map.insert("brake".to_string(), serde_json::to_value(self.state.brake)?);
        }
        if mask.includes("speed") {
            map.insert("speed".to_string(), serde_json::to_value(self.state.speed)?);
        }
        if mask.includes("gear") {
            map.insert("gear".to_string(), serde_json::to_value(self.state.gear)?);
        }
        if mask.includes("drs") {
            map.insert("drs".to_string(), serde_json::to_value(self.state.drs)?);
        }

        Ok(serde_json::Value::Object(map))
    }
}

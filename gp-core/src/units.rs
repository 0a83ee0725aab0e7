//! Type-safe wrappers for physical units
//!
//! Newtype wrappers around f32/f64 so positions, times, speeds and pedal
//! percentages cannot be mixed up when they leave the engine.
//!
//! All unit types serialize with 4 decimal places to reduce JSON payload size.

use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// Round f32 to 4 decimal places for compact JSON serialization
fn round4<S: serde::Serializer>(val: &f32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f32((*val * 10000.0).round() / 10000.0)
}

fn round4_f64<S: serde::Serializer>(val: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((*val * 10000.0).round() / 10000.0)
}

/// Meters (world-space position component)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Meters(#[serde(serialize_with = "round4")] pub f32);

/// Seconds (session or lap-local time, durations)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Seconds(#[serde(serialize_with = "round4_f64")] pub f64);

impl Sub for Seconds {
    type Output = Seconds;

    fn sub(self, rhs: Seconds) -> Seconds {
        Seconds(self.0 - rhs.0)
    }
}

/// Kilometers per hour
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct KilometersPerHour(#[serde(serialize_with = "round4")] pub f32);

impl KilometersPerHour {
    pub fn to_meters_per_second(self) -> f32 {
        self.0 / 3.6
    }
}

/// Pedal application (0.0 to 100.0)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Percent(#[serde(serialize_with = "round4")] pub f32);

impl Percent {
    /// Create a new percentage, clamping to [0.0, 100.0]
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 100.0))
    }

    /// Get as a fraction (0.0-1.0)
    pub fn as_fraction(&self) -> f32 {
        self.0 / 100.0
    }
}

/// Linear interpolation between two scalars, `t` in [0, 1]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_clamp() {
        assert_eq!(Percent::new(120.0).0, 100.0);
        assert_eq!(Percent::new(-3.0).0, 0.0);
        assert_eq!(Percent::new(42.5).0, 42.5);
    }

    #[test]
    fn test_percent_as_fraction() {
        let p = Percent::new(75.0);
        assert!((p.as_fraction() - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_units_serialize_rounded() {
        let json = serde_json::to_string(&Seconds(1.234_567_89)).unwrap();
        assert_eq!(json, "1.2346");

        let json = serde_json::to_string(&Meters(0.5)).unwrap();
        assert_eq!(json, "0.5");
    }

    #[test]
    fn test_kph_to_mps() {
        let v = KilometersPerHour(36.0);
        assert!((v.to_meters_per_second() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp(10.0, 20.0, 0.0), 10.0);
        assert_eq!(lerp(10.0, 20.0, 1.0), 20.0);
        assert_eq!(lerp(10.0, 20.0, 0.5), 15.0);
    }
}

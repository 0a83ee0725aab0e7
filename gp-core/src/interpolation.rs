//! Interpolation between two recorded samples
//!
//! Continuous channels (position, throttle, brake, speed) are interpolated
//! linearly. Gear and DRS are categorical and follow a step function: they
//! keep the lower sample's value until the fraction reaches 1.0.

use crate::model::{InterpolatedState, Sample};
use crate::timeline::Bracket;
use crate::units::*;

/// Interpolate the state at `time` between `lower` and `upper`.
///
/// Pure and deterministic. When both samples share a timestamp (clamped
/// edge or exact hit) the lower sample is returned verbatim.
pub fn interpolate(lower: &Sample, upper: &Sample, time: f64) -> InterpolatedState {
    let span = upper.time.0 - lower.time.0;
    if lower == upper || span <= 0.0 {
        return verbatim(lower);
    }

    let f = ((time - lower.time.0) / span).clamp(0.0, 1.0);
    // NaN fails the clamp above; treat it as sitting on `lower`.
    let f = if f.is_nan() { 0.0 } else { f };
    let t = f as f32;
    let step = if f >= 1.0 { upper } else { lower };

    InterpolatedState {
        time: Seconds(lower.time.0 + span * f),
        position: lower.position.lerp(&upper.position, t),
        throttle: Percent::new(lerp(lower.throttle as f32, upper.throttle as f32, t)),
        brake: Percent::new(lerp(lower.brake as f32, upper.brake as f32, t)),
        speed: KilometersPerHour(lerp(lower.speed as f32, upper.speed as f32, t)),
        gear: step.gear,
        drs: step.drs,
    }
}

/// Interpolate inside a lap using a bracket from [`crate::timeline::find_bracket`].
pub fn interpolate_bracket(samples: &[Sample], bracket: Bracket, time: f64) -> InterpolatedState {
    interpolate(&samples[bracket.lower], &samples[bracket.upper], time)
}

fn verbatim(sample: &Sample) -> InterpolatedState {
    InterpolatedState {
        time: sample.time,
        position: sample.position,
        throttle: Percent::new(sample.throttle as f32),
        brake: Percent::new(sample.brake as f32),
        speed: KilometersPerHour(sample.speed as f32),
        gear: sample.gear,
        drs: sample.drs,
    }
}

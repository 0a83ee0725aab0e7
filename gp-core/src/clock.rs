//! Playback clock
//!
//! A single time cursor shared by every car in a session. The clock is a
//! plain value: whoever owns it is the single writer. Callers that share it
//! across threads wrap it in a lock so each transition is applied whole and
//! readers never observe a torn (state, cursor) pair.

use serde::Serialize;
use tracing::warn;

/// Largest playback rate magnitude accepted by [`PlaybackClock::set_rate`]
pub const MAX_RATE: f64 = 16.0;

/// Smallest rate magnitude reachable through [`PlaybackClock::slower`]
pub const MIN_STEP_RATE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Copy of the clock at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockSnapshot {
    pub state: PlaybackState,
    pub cursor: f64,
    pub rate: f64,
    pub max_time: f64,
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: PlaybackState,
    cursor: f64,
    rate: f64,
    max_time: f64,
}

impl PlaybackClock {
    /// New stopped clock at t = 0 covering `[0, max_time]`.
    pub fn new(max_time: f64) -> Self {
        Self {
            state: PlaybackState::Stopped,
            cursor: 0.0,
            rate: 1.0,
            max_time: sanitize_bound(max_time),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            state: self.state,
            cursor: self.cursor,
            rate: self.rate,
            max_time: self.max_time,
        }
    }

    /// Stopped/Paused -> Playing
    pub fn play(&mut self) {
        self.state = PlaybackState::Playing;
    }

    /// Playing -> Paused. A stopped clock stays stopped.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Play if paused or stopped, pause if playing.
    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the cursor, clamped to `[0, max_time]`. State is unchanged.
    ///
    /// Out-of-range times are not an error; NaN is ignored.
    pub fn seek(&mut self, time: f64) {
        if time.is_nan() {
            warn!("Ignoring seek to NaN");
            return;
        }
        self.cursor = time.clamp(0.0, self.max_time);
    }

    /// Set the playback rate multiplier; negative plays in reverse.
    ///
    /// Clamped to `[-MAX_RATE, MAX_RATE]`, non-finite values are ignored.
    pub fn set_rate(&mut self, rate: f64) {
        if !rate.is_finite() {
            warn!("Ignoring non-finite playback rate {}", rate);
            return;
        }
        self.rate = rate.clamp(-MAX_RATE, MAX_RATE);
    }

    /// Double the rate magnitude, keeping its direction.
    pub fn faster(&mut self) {
        let magnitude = (self.rate.abs() * 2.0).clamp(MIN_STEP_RATE, MAX_RATE);
        self.rate = magnitude.copysign(self.rate);
    }

    /// Halve the rate magnitude, keeping its direction.
    pub fn slower(&mut self) {
        let magnitude = (self.rate.abs() / 2.0).clamp(MIN_STEP_RATE, MAX_RATE);
        self.rate = magnitude.copysign(self.rate);
    }

    /// Change the upper bound (e.g. after a new driver/lap selection),
    /// pulling the cursor back inside if needed.
    pub fn set_max_time(&mut self, max_time: f64) {
        self.max_time = sanitize_bound(max_time);
        self.cursor = self.cursor.clamp(0.0, self.max_time);
    }

    /// Advance by `dt` wall seconds scaled by the rate while playing.
    ///
    /// Hitting a bound in the direction of travel pauses the clock; there is
    /// no looping. Returns the cursor after the tick.
    pub fn tick(&mut self, dt: f64) -> f64 {
        if !self.is_playing() {
            return self.cursor;
        }
        if !dt.is_finite() || dt < 0.0 {
            warn!("Ignoring invalid tick duration {}", dt);
            return self.cursor;
        }

        let next = self.cursor + dt * self.rate;
        self.cursor = next.clamp(0.0, self.max_time);

        let hit_end = self.rate > 0.0 && next >= self.max_time;
        let hit_start = self.rate < 0.0 && next <= 0.0;
        if hit_end || hit_start {
            self.state = PlaybackState::Paused;
        }
        self.cursor
    }
}

fn sanitize_bound(max_time: f64) -> f64 {
    if max_time.is_finite() && max_time > 0.0 {
        max_time
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initial_state() {
        let clock = PlaybackClock::new(100.0);
        assert_eq!(clock.state(), PlaybackState::Stopped);
        assert_eq!(clock.cursor(), 0.0);
        assert_eq!(clock.rate(), 1.0);
    }

    #[test]
    fn test_transitions() {
        let mut clock = PlaybackClock::new(100.0);

        clock.pause();
        assert_eq!(clock.state(), PlaybackState::Stopped);

        clock.play();
        assert_eq!(clock.state(), PlaybackState::Playing);

        clock.pause();
        assert_eq!(clock.state(), PlaybackState::Paused);

        clock.toggle();
        assert_eq!(clock.state(), PlaybackState::Playing);
        clock.toggle();
        assert_eq!(clock.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_seek_keeps_state_and_clamps() {
        let mut clock = PlaybackClock::new(100.0);
        clock.seek(42.0);
        assert_eq!(clock.cursor(), 42.0);
        assert_eq!(clock.state(), PlaybackState::Stopped);

        clock.play();
        clock.seek(-5.0);
        assert_eq!(clock.cursor(), 0.0);
        assert_eq!(clock.state(), PlaybackState::Playing);

        clock.seek(1e12);
        assert_eq!(clock.cursor(), 100.0);

        clock.seek(f64::NEG_INFINITY);
        assert_eq!(clock.cursor(), 0.0);

        clock.seek(f64::NAN);
        assert_eq!(clock.cursor(), 0.0);
    }

    #[test]
    fn test_tick_only_advances_while_playing() {
        let mut clock = PlaybackClock::new(100.0);
        clock.tick(5.0);
        assert_eq!(clock.cursor(), 0.0);

        clock.play();
        clock.tick(5.0);
        assert_eq!(clock.cursor(), 5.0);

        clock.pause();
        clock.tick(5.0);
        assert_eq!(clock.cursor(), 5.0);
    }

    #[test]
    fn test_tick_scales_by_rate() {
        let mut clock = PlaybackClock::new(100.0);
        clock.set_rate(4.0);
        clock.play();
        assert_eq!(clock.tick(0.5), 2.0);
    }

    #[test]
    fn test_reverse_playback_pauses_at_zero() {
        let mut clock = PlaybackClock::new(100.0);
        clock.seek(5.0);
        clock.set_rate(-1.0);
        clock.play();

        clock.tick(3.0);
        assert_eq!(clock.cursor(), 2.0);
        assert_eq!(clock.state(), PlaybackState::Playing);

        clock.tick(10.0);
        assert_eq!(clock.cursor(), 0.0);
        assert_eq!(clock.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_forward_playback_pauses_at_end() {
        let mut clock = PlaybackClock::new(10.0);
        clock.seek(8.0);
        clock.play();

        clock.tick(2.0);
        assert_eq!(clock.cursor(), 10.0);
        assert_eq!(clock.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_reverse_from_end_keeps_playing() {
        let mut clock = PlaybackClock::new(10.0);
        clock.seek(10.0);
        clock.set_rate(-2.0);
        clock.play();

        clock.tick(1.0);
        assert_eq!(clock.cursor(), 8.0);
        assert!(clock.is_playing());
    }

    #[test]
    fn test_zero_rate_holds_position() {
        let mut clock = PlaybackClock::new(10.0);
        clock.seek(4.0);
        clock.set_rate(0.0);
        clock.play();

        clock.tick(100.0);
        assert_eq!(clock.cursor(), 4.0);
        assert!(clock.is_playing());
    }

    #[test]
    fn test_invalid_ticks_are_ignored() {
        let mut clock = PlaybackClock::new(10.0);
        clock.play();
        clock.tick(-1.0);
        clock.tick(f64::NAN);
        clock.tick(f64::INFINITY);
        assert_eq!(clock.cursor(), 0.0);
        assert!(clock.is_playing());
    }

    #[test]
    fn test_set_rate_clamps_and_ignores_non_finite() {
        let mut clock = PlaybackClock::new(10.0);
        clock.set_rate(100.0);
        assert_eq!(clock.rate(), MAX_RATE);
        clock.set_rate(-100.0);
        assert_eq!(clock.rate(), -MAX_RATE);
        clock.set_rate(f64::NAN);
        assert_eq!(clock.rate(), -MAX_RATE);
    }

    #[test]
    fn test_faster_and_slower_keep_direction() {
        let mut clock = PlaybackClock::new(10.0);
        clock.faster();
        assert_eq!(clock.rate(), 2.0);
        for _ in 0..10 {
            clock.faster();
        }
        assert_eq!(clock.rate(), MAX_RATE);

        clock.set_rate(-1.0);
        clock.slower();
        assert_eq!(clock.rate(), -0.5);
        for _ in 0..10 {
            clock.slower();
        }
        assert_eq!(clock.rate(), -MIN_STEP_RATE);
    }

    #[test]
    fn test_set_max_time_pulls_cursor_in() {
        let mut clock = PlaybackClock::new(100.0);
        clock.seek(80.0);
        clock.set_max_time(50.0);
        assert_eq!(clock.cursor(), 50.0);
        assert_eq!(clock.max_time(), 50.0);
    }

    #[test]
    fn test_degenerate_bounds() {
        let mut clock = PlaybackClock::new(f64::NAN);
        assert_eq!(clock.max_time(), 0.0);
        clock.play();
        clock.tick(1.0);
        assert_eq!(clock.cursor(), 0.0);
        assert_eq!(clock.state(), PlaybackState::Paused);
    }

    proptest! {
        #[test]
        fn prop_cursor_always_within_bounds(
            max_time in 0.0f64..10_000.0,
            ops in prop::collection::vec((0u8..5, -1e6f64..1e6), 1..50),
        ) {
            let mut clock = PlaybackClock::new(max_time);
            for (op, value) in ops {
                match op {
                    0 => clock.seek(value),
                    1 => clock.set_rate(value / 1e5),
                    2 => clock.play(),
                    3 => clock.pause(),
                    _ => { clock.tick(value.abs() / 1e3); }
                }
                prop_assert!(clock.cursor() >= 0.0);
                prop_assert!(clock.cursor() <= clock.max_time());
            }
        }
    }
}

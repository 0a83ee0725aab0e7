//! GridPlay Core Library
//!
//! Session telemetry store and synchronized playback engine: loads a
//! recorded motorsport session document, indexes every car's laps on a
//! shared timeline, and answers where each car is, and what it is doing,
//! at any playback time.

pub mod analytics;
pub mod clock;
pub mod error;
pub mod interpolation;
pub mod loader;
pub mod model;
pub mod query;
pub mod timeline;
pub mod turn;
pub mod units;

pub use analytics::GapToLeader;
pub use clock::{ClockSnapshot, PlaybackClock, PlaybackState};
pub use error::{LoadError, ParseError};
pub use loader::{load, load_str};
pub use model::{CarState, FieldMask, InterpolatedState, Session};
pub use query::{QueryEngine, Selection};

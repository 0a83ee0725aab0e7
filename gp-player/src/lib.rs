//! GridPlay Player Library
//!
//! Shared playback state, the playback task, output sinks and the command
//! line configuration of the `gridplay` binary. Exposed as a library for
//! integration testing.

pub mod config;
pub mod playback;
pub mod replay;
pub mod sinks;
pub mod state;

//! Session sources for GridPlay
//!
//! Everything that produces a [`Session`]: recorded session documents on
//! disk, a synthetic demo session, and discovery of documents in a data
//! directory.

pub mod catalog;
pub mod demo;
pub mod file;

use anyhow::Result;
use gp_core::Session;

pub use catalog::AvailableSession;
pub use demo::DemoSource;
pub use file::JsonFileSource;

/// Anything that can hand over a fully loaded session
pub trait SessionSource: Send + Sync {
    /// Human readable name for logs (e.g., a file name or "Demo")
    fn name(&self) -> &str;

    /// Produce the session. Either the whole session loads or an error is
    /// returned; there are no partial sessions.
    fn load(&self) -> Result<Session>;
}

//! Error types for session loading

use thiserror::Error;

/// A session document could not be turned into a session tree
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Valid JSON, but no driver has a lap with samples once empty laps are dropped
    #[error("session contains no drivers with recorded laps")]
    EmptySession,
}

/// Malformed JSON, a missing required field, or a value that breaks an
/// invariant of the session tree
#[derive(Debug, Error)]
#[error("invalid session document at {path}: {reason}")]
pub struct ParseError {
    /// Location of the offending value, e.g. `drivers[2].laps[5].samples[17]`
    pub path: String,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(path, err.to_string())
    }
}

//! Discovery of session documents in a data directory

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A session document found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableSession {
    pub path: PathBuf,
    /// Display name derived from the file stem
    pub name: String,
}

/// Default location of session documents: `<data_dir>/gridplay/sessions`
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("gridplay").join("sessions"))
}

/// List `*.json` documents in `dir`, sorted by file name.
///
/// A missing directory is an empty catalog, not an error.
pub fn discover(dir: &Path) -> Result<Vec<AvailableSession>> {
    if !dir.exists() {
        debug!("Session directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list session directory: {}", dir.display()))?;

    let mut sessions = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read entry in {}", dir.display()))?
            .path();

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !path.is_file() || !is_json {
            continue;
        }

        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        sessions.push(AvailableSession {
            name: display_name(&stem),
            path,
        });
    }

    sessions.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    debug!("Found {} session documents in {}", sessions.len(), dir.display());
    Ok(sessions)
}

/// `2025_austin_q` -> `2025 Austin Q`
pub fn display_name(stem: &str) -> String {
    stem.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

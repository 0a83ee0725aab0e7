//! Session documents stored as JSON files

use crate::SessionSource;
use anyhow::{Context, Result};
use gp_core::Session;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Session> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;

        let session = gp_core::load(&bytes)
            .with_context(|| format!("Failed to load session from {}", self.path.display()))?;

        info!(
            "Loaded {} from {} ({} drivers, {} laps)",
            session.title(),
            self.name,
            session.drivers().len(),
            session.lap_count()
        );
        Ok(session)
    }
}

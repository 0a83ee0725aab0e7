//! Output sink implementations
//!
//! Sinks forward playback frames to a destination (NDJSON file, log)

use crate::replay::Frame;
use anyhow::{Context, Result};
use gp_core::FieldMask;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Trait for output sinks
pub trait Sink: Send {
    fn name(&self) -> &str;

    fn send(&mut self, frame: &Frame, mask: Option<&FieldMask>) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Configuration for an output sink
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SinkConfig {
    pub sink_type: SinkType,
    pub field_mask: Option<String>, // Comma-separated field names
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkType {
    File { path: PathBuf },
    Log { every: u64 },
}

/// File sink (NDJSON, one frame per line)
pub struct FileSink {
    name: String,
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open output file: {}", path.display()))?;
        Ok(Self {
            name: format!("file:{}", path.display()),
            writer: BufWriter::new(file),
        })
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, frame: &Frame, mask: Option<&FieldMask>) -> Result<()> {
        let json = frame.to_json_filtered(mask)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Logs a one-line running order every `every` frames
pub struct LogSink {
    every: u64,
    received: u64,
}

impl LogSink {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            received: 0,
        }
    }

    pub fn summary(frame: &Frame) -> String {
        let order: Vec<String> = frame
            .gaps
            .iter()
            .map(|gap| match (gap.rank, gap.time_gap) {
                (1, _) => format!("{} L{}", gap.driver, gap.lap),
                (_, Some(gap_time)) => format!("{} {:+.3}s", gap.driver, gap_time.0),
                (_, None) => format!("{} {:+.2} laps", gap.driver, gap.laps_behind),
            })
            .collect();
        format!("t={:.1}s x{} | {}", frame.cursor, frame.rate, order.join(", "))
    }
}

impl Sink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&mut self, frame: &Frame, _mask: Option<&FieldMask>) -> Result<()> {
        self.received += 1;
        if (self.received - 1) % self.every == 0 || frame.is_final() {
            info!("{}", Self::summary(frame));
        }
        Ok(())
    }
}

/// Create a sink from configuration
pub fn create_sink(config: &SinkConfig) -> Result<Box<dyn Sink>> {
    match &config.sink_type {
        SinkType::File { path } => Ok(Box::new(FileSink::new(path.clone())?)),
        SinkType::Log { every } => Ok(Box::new(LogSink::new(*every))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{PlaybackCommand, ReplayState};
    use gp_core::Selection;
    use gp_sources::{DemoSource, SessionSource};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn frame_at(time: f64) -> Frame {
        let session = DemoSource::new().with_drivers(2).with_laps(1).load().unwrap();
        let mut replay = ReplayState::from_session(Arc::new(session), Selection::all());
        replay.apply(PlaybackCommand::Seek(time));
        replay.frame()
    }

    #[test]
    fn test_file_sink_writes_ndjson() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frames.ndjson");
        let config = SinkConfig {
            sink_type: SinkType::File { path: path.clone() },
            field_mask: Some("position".to_string()),
        };

        let mut sink = create_sink(&config).unwrap();
        let mask = config.field_mask.as_deref().map(FieldMask::parse);
        sink.send(&frame_at(10.0), mask.as_ref()).unwrap();
        sink.send(&frame_at(20.0), mask.as_ref()).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["cursor"], 20.0);

        let car = &lines[0]["cars"]["RIV"];
        assert!(car.get("position").is_some());
        assert!(car.get("speed").is_none());
    }

    #[test]
    fn test_log_summary() {
        let summary = LogSink::summary(&frame_at(30.0));
        assert!(summary.starts_with("t=30.0s x1 | RIV L1, CHE +"));
    }

    #[test]
    fn test_sink_config_serde() {
        let config: SinkConfig =
            serde_json::from_str(r#"{"sink_type": {"type": "log", "every": 60}, "field_mask": null}"#)
                .unwrap();
        assert!(matches!(config.sink_type, SinkType::Log { every: 60 }));
        assert_eq!(create_sink(&config).unwrap().name(), "log");
    }
}

//! Command line configuration for the headless player

use crate::sinks::{SinkConfig, SinkType};
use anyhow::{bail, Result};
use clap::Parser;
use gp_core::Selection;
use gp_sources::catalog;
use gp_sources::{DemoSource, JsonFileSource, SessionSource};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// ~60Hz
pub const DEFAULT_TICK_MS: u64 = 16;

#[derive(Parser, Debug, Clone)]
#[command(name = "gridplay", version, about = "Synchronized playback of recorded motorsport sessions", long_about = None)]
pub struct PlayerConfig {
    /// Session document to play: a path, or a file stem in the data directory
    pub session: Option<String>,

    /// Play a generated demo session instead of a document
    #[arg(long, conflicts_with = "session")]
    pub demo: bool,

    /// Number of drivers in the demo session
    #[arg(long, default_value_t = 6)]
    pub demo_drivers: usize,

    /// Number of laps per driver in the demo session
    #[arg(long, default_value_t = 3)]
    pub demo_laps: u32,

    /// Directory holding session documents [default: <data dir>/gridplay/sessions]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// List the sessions in the data directory and exit
    #[arg(long)]
    pub list: bool,

    /// Playback rate multiplier; negative plays in reverse
    #[arg(short, long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub rate: f64,

    /// Wall-clock milliseconds between playback ticks
    #[arg(long, default_value_t = DEFAULT_TICK_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Playback time to start at, in seconds [default: start, or end when reversing]
    #[arg(short, long, allow_negative_numbers = true)]
    pub start: Option<f64>,

    /// Comma-separated driver codes to play [default: all]
    #[arg(short, long, value_delimiter = ',')]
    pub drivers: Vec<String>,

    /// Lap number `N` or range `A-B` to play [default: all]
    #[arg(short, long, value_parser = parse_laps)]
    pub laps: Option<RangeInclusive<u32>>,

    /// Comma-separated car fields to write (e.g. position,speed,gear)
    #[arg(short, long)]
    pub fields: Option<String>,

    /// Write every frame as NDJSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl PlayerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Drivers and laps to play, from `--drivers` and `--laps`
    pub fn selection(&self) -> Selection {
        let mut selection = Selection::all();
        let codes: Vec<String> = self
            .drivers
            .iter()
            .map(|code| code.trim().to_uppercase())
            .filter(|code| !code.is_empty())
            .collect();
        if !codes.is_empty() {
            selection = selection.drivers(codes);
        }
        if let Some(laps) = &self.laps {
            selection = selection.laps(laps.clone());
        }
        selection
    }

    /// Sinks requested on the command line. The log sink always runs,
    /// roughly one line per wall second; `--fields` applies to `--output`.
    pub fn sink_configs(&self) -> Vec<SinkConfig> {
        let every = (1000 / self.tick_ms).max(1);
        let mut configs = vec![SinkConfig {
            sink_type: SinkType::Log { every },
            field_mask: None,
        }];
        if let Some(path) = &self.output {
            configs.push(SinkConfig {
                sink_type: SinkType::File { path: path.clone() },
                field_mask: self.fields.clone(),
            });
        }
        configs
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(catalog::default_data_dir)
    }

    /// The source named on the command line
    pub fn source(&self) -> Result<Box<dyn SessionSource>> {
        if self.demo {
            return Ok(Box::new(
                DemoSource::new()
                    .with_drivers(self.demo_drivers)
                    .with_laps(self.demo_laps),
            ));
        }

        let Some(session) = &self.session else {
            bail!("No session given; pass a session document, a session name or --demo");
        };

        let path = PathBuf::from(session);
        if path.exists() {
            return Ok(Box::new(JsonFileSource::new(path)));
        }

        if let Some(dir) = self.data_dir() {
            let candidate = dir.join(format!("{}.json", session));
            if candidate.exists() {
                return Ok(Box::new(JsonFileSource::new(candidate)));
            }
        }
        bail!("Session not found: {}", session)
    }
}

/// `N` or `A-B`, lap numbers start at 1
pub fn parse_laps(value: &str) -> Result<RangeInclusive<u32>, String> {
    let parse = |s: &str| -> Result<u32, String> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid lap number '{}'", s.trim()))?;
        if n == 0 {
            return Err("lap numbers start at 1".to_string());
        }
        Ok(n)
    };

    match value.split_once('-') {
        Some((from, to)) => {
            let (from, to) = (parse(from)?, parse(to)?);
            if from > to {
                return Err(format!("lap range {}-{} is reversed", from, to));
            }
            Ok(from..=to)
        }
        None => {
            let n = parse(value)?;
            Ok(n..=n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> PlayerConfig {
        PlayerConfig::try_parse_from(std::iter::once("gridplay").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--demo"]);
        assert!(config.demo);
        assert_eq!(config.rate, 1.0);
        assert_eq!(config.tick_interval(), Duration::from_millis(16));
        assert_eq!(config.start, None);
        assert_eq!(config.selection(), Selection::all());
        assert_eq!(config.sink_configs().len(), 1);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_laps() {
        assert_eq!(parse_laps("3"), Ok(3..=3));
        assert_eq!(parse_laps("2-5"), Ok(2..=5));
        assert_eq!(parse_laps(" 2 - 5 "), Ok(2..=5));
        assert!(parse_laps("0").is_err());
        assert!(parse_laps("5-2").is_err());
        assert!(parse_laps("x").is_err());
        assert!(parse_laps("1-").is_err());
    }

    #[test]
    fn test_selection_from_args() {
        let config = parse(&["--demo", "--drivers", "ver, ham,", "--laps", "2-3"]);
        let selection = config.selection();
        assert!(selection.includes_driver("VER"));
        assert!(selection.includes_driver("HAM"));
        assert!(!selection.includes_driver("LEC"));
        assert!(!selection.includes_lap(1));
        assert!(selection.includes_lap(3));
    }

    #[test]
    fn test_negative_rate_and_fields() {
        let config = parse(&["--demo", "--rate", "-2", "--fields", "position,speed"]);
        assert_eq!(config.rate, -2.0);
        // Without --output the mask has nowhere to go
        assert_eq!(config.sink_configs().len(), 1);
    }

    #[test]
    fn test_output_sink_carries_field_mask() {
        let config = parse(&[
            "--demo", "--tick-ms", "50", "--output", "frames.ndjson", "--fields", "position,speed",
        ]);
        let sinks = config.sink_configs();
        assert_eq!(sinks.len(), 2);
        assert!(matches!(sinks[0].sink_type, SinkType::Log { every: 20 }));
        assert!(sinks[0].field_mask.is_none());
        assert!(matches!(&sinks[1].sink_type, SinkType::File { path } if path == &PathBuf::from("frames.ndjson")));
        assert_eq!(sinks[1].field_mask.as_deref(), Some("position,speed"));
    }

    #[test]
    fn test_rejects_zero_tick_and_demo_with_session() {
        assert!(PlayerConfig::try_parse_from(["gridplay", "--demo", "--tick-ms", "0"]).is_err());
        assert!(PlayerConfig::try_parse_from(["gridplay", "--demo", "session.json"]).is_err());
    }

    #[test]
    fn test_source_resolution() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("2025_austin_q.json"), b"{}").unwrap();
        let data_dir = dir.path().to_str().unwrap();

        let config = parse(&["--data-dir", data_dir, "2025_austin_q"]);
        assert_eq!(config.source().unwrap().name(), "2025_austin_q.json");

        let config = parse(&["--data-dir", data_dir, "missing"]);
        assert!(config.source().is_err());

        let config = parse(&["--data-dir", data_dir]);
        assert!(config.source().is_err());

        let config = parse(&["--demo"]);
        assert_eq!(config.source().unwrap().name(), "Demo");
    }
}

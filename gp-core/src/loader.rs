//! Session document loader
//!
//! Parses the JSON document written by the session fetch tool into a
//! validated [`Session`] tree. Either the whole document loads or the call
//! fails; no partial session is ever returned.
//!
//! Drivers and laps are deserialized one at a time so that a failure can
//! report where in the document it happened (`drivers[3].laps[12]`).

use crate::error::{LoadError, ParseError};
use crate::model::*;
use crate::units::*;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

// ============================================================================
// Wire format
// ============================================================================

#[derive(Deserialize)]
struct RawSession {
    year: i32,
    circuit: String,
    circuit_short: String,
    session_type: SessionKind,
    date: String,
    drivers: Vec<Value>,
}

#[derive(Deserialize)]
struct RawDriverEntry {
    driver: RawDriver,
    laps: Vec<Value>,
}

#[derive(Deserialize)]
struct RawDriver {
    code: String,
    name: String,
    number: u32,
    team: String,
    team_color: String,
}

#[derive(Deserialize)]
struct RawLap {
    number: u32,
    #[serde(default)]
    lap_time: Option<f64>,
    #[serde(default)]
    sector_times: [Option<f64>; 3],
    #[serde(default)]
    is_valid: Option<bool>,
    samples: Vec<Value>,
}

#[derive(Deserialize)]
struct RawSample {
    position: [f32; 3],
    time: f64,
    throttle: u16,
    brake: u16,
    gear: i8,
    speed: u16,
    drs: RawDrs,
}

/// The fetch tool writes "Active"/"Off"; raw feed codes are accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDrs {
    State(DrsState),
    Code(i32),
}

impl From<RawDrs> for DrsState {
    fn from(raw: RawDrs) -> Self {
        match raw {
            RawDrs::State(state) => state,
            RawDrs::Code(code) => DrsState::from_raw_code(code),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load a session from raw JSON bytes.
pub fn load(bytes: &[u8]) -> Result<Session, LoadError> {
    let raw: RawSession =
        serde_json::from_slice(bytes).map_err(|e| ParseError::json("$", e))?;

    let date = parse_date(&raw.date).map_err(|reason| ParseError::new("date", reason))?;

    let mut codes = HashSet::new();
    let mut numbers = HashSet::new();
    let mut drivers = Vec::with_capacity(raw.drivers.len());

    for (i, value) in raw.drivers.into_iter().enumerate() {
        let path = format!("drivers[{}]", i);
        let entry: RawDriverEntry = from_value(&path, value)?;

        if !codes.insert(entry.driver.code.clone()) {
            return Err(ParseError::new(
                format!("{}.driver.code", path),
                format!("duplicate driver code '{}'", entry.driver.code),
            )
            .into());
        }
        if !numbers.insert(entry.driver.number) {
            return Err(ParseError::new(
                format!("{}.driver.number", path),
                format!("duplicate car number {}", entry.driver.number),
            )
            .into());
        }

        if let Some(driver) = build_driver(&path, entry)? {
            drivers.push(driver);
        }
    }

    if drivers.is_empty() {
        return Err(LoadError::EmptySession);
    }

    normalize_time_base(&mut drivers);

    let session = Session::new(
        raw.year,
        raw.circuit,
        raw.circuit_short,
        raw.session_type,
        date,
        drivers,
    );

    info!(
        "Loaded session {}: {} drivers, {} laps, {} samples",
        session.title(),
        session.drivers().len(),
        session.lap_count(),
        session.sample_count()
    );

    Ok(session)
}

/// Load a session from a JSON string.
pub fn load_str(json: &str) -> Result<Session, LoadError> {
    load(json.as_bytes())
}

fn from_value<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|e| ParseError::json(path, e))
}

fn build_driver(path: &str, entry: RawDriverEntry) -> Result<Option<Driver>, ParseError> {
    let team_color = entry
        .driver
        .team_color
        .parse::<TeamColor>()
        .map_err(|reason| ParseError::new(format!("{}.driver.team_color", path), reason))?;

    let info = DriverInfo {
        code: entry.driver.code,
        name: entry.driver.name,
        number: entry.driver.number,
        team: entry.driver.team,
        team_color,
    };

    let mut lap_numbers = HashSet::new();
    let mut laps = Vec::with_capacity(entry.laps.len());

    for (j, value) in entry.laps.into_iter().enumerate() {
        let lap_path = format!("{}.laps[{}]", path, j);
        let raw: RawLap = from_value(&lap_path, value)?;

        if raw.number == 0 {
            return Err(ParseError::new(
                format!("{}.number", lap_path),
                "lap numbers start at 1",
            ));
        }
        if !lap_numbers.insert(raw.number) {
            return Err(ParseError::new(
                format!("{}.number", lap_path),
                format!("duplicate lap number {} for {}", raw.number, info.code),
            ));
        }

        let number = raw.number;
        match build_lap(&lap_path, raw)? {
            Some(lap) => laps.push(lap),
            None => debug!("Dropping lap {} of {}: no samples", number, info.code),
        }
    }

    let code = info.code.clone();
    let driver = Driver::new(info, laps);
    if driver.is_none() {
        debug!("Dropping driver {}: no laps with samples", code);
    }
    Ok(driver)
}

fn build_lap(path: &str, raw: RawLap) -> Result<Option<Lap>, ParseError> {
    let mut samples = Vec::with_capacity(raw.samples.len());
    let mut clamped = 0usize;

    for (k, value) in raw.samples.into_iter().enumerate() {
        let sample_path = format!("{}.samples[{}]", path, k);
        let s: RawSample = from_value(&sample_path, value)?;

        if !s.time.is_finite() {
            return Err(ParseError::new(
                format!("{}.time", sample_path),
                "time must be finite",
            ));
        }
        if s.position.iter().any(|c| !c.is_finite()) {
            return Err(ParseError::new(
                format!("{}.position", sample_path),
                "position components must be finite",
            ));
        }
        if s.throttle > 100 || s.brake > 100 {
            clamped += 1;
        }

        samples.push(Sample {
            position: Vector3::from_array(s.position),
            time: Seconds(s.time),
            throttle: s.throttle.min(100) as u8,
            brake: s.brake.min(100) as u8,
            gear: s.gear,
            speed: s.speed,
            drs: s.drs.into(),
        });
    }

    if clamped > 0 {
        debug!("{}: clamped {} pedal values above 100%", path, clamped);
    }

    Ok(Lap::new(
        raw.number,
        raw.lap_time.map(Seconds),
        raw.sector_times.map(|t| t.map(Seconds)),
        raw.is_valid.unwrap_or(true),
        samples,
    ))
}

/// Shift every sample so the earliest one in the session sits at t = 0.
fn normalize_time_base(drivers: &mut [Driver]) {
    let origin = drivers
        .iter()
        .flat_map(|d| d.laps().iter())
        .map(|lap| lap.first_time().0)
        .fold(f64::INFINITY, f64::min);

    if origin.is_finite() && origin != 0.0 {
        debug!("Rebasing session time by {:.3}s", origin);
        for driver in drivers.iter_mut() {
            for lap in driver.laps_mut() {
                lap.shift_time(origin);
            }
        }
    }
}

/// Accepts RFC 3339 or a naive ISO-8601 datetime (taken as UTC).
fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("'{}' is not an ISO-8601 datetime: {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(time: f64, x: f32) -> Value {
        json!({
            "position": [x, 0.0, 0.0],
            "time": time,
            "throttle": 100, "brake": 0, "gear": 7,
            "speed": 300, "drs": "Off"
        })
    }

    fn lap(number: u32, samples: Vec<Value>) -> Value {
        json!({
            "number": number,
            "lap_time": 90.5,
            "sector_times": [30.1, null, 30.2],
            "is_valid": true,
            "samples": samples
        })
    }

    fn driver(code: &str, number: u32, laps: Vec<Value>) -> Value {
        json!({
            "driver": {
                "code": code, "name": "Test Driver", "number": number,
                "team": "Test Team", "team_color": "#FF8000"
            },
            "laps": laps
        })
    }

    fn document(drivers: Vec<Value>) -> Value {
        json!({
            "year": 2024,
            "circuit": "United States Grand Prix",
            "circuit_short": "Austin",
            "session_type": "Qualifying",
            "date": "2024-10-19T22:00:00",
            "drivers": drivers
        })
    }

    fn load_value(doc: &Value) -> Result<Session, LoadError> {
        load(doc.to_string().as_bytes())
    }

    fn parse_error(result: Result<Session, LoadError>) -> ParseError {
        match result {
            Err(LoadError::Parse(err)) => err,
            other => panic!("expected parse error, got {:?}", other.map(|s| s.title())),
        }
    }

    #[test]
    fn test_load_minimal_session() {
        let doc = document(vec![driver(
            "NOR",
            4,
            vec![lap(1, vec![sample(0.0, 0.0), sample(10.0, 100.0)])],
        )]);
        let session = load_value(&doc).unwrap();

        assert_eq!(session.year, 2024);
        assert_eq!(session.kind, SessionKind::Qualifying);
        assert_eq!(session.title(), "2024 Austin Q");
        assert_eq!(session.driver_codes(), vec!["NOR"]);

        let nor = session.driver("NOR").unwrap();
        assert_eq!(nor.info.team_color, TeamColor { r: 0xFF, g: 0x80, b: 0x00 });
        let lap = nor.lap(1).unwrap();
        assert_eq!(lap.lap_time, Some(Seconds(90.5)));
        assert_eq!(lap.sector_times, [Some(Seconds(30.1)), None, Some(Seconds(30.2))]);
        assert_eq!(lap.samples().len(), 2);
        assert_eq!(lap.last_sample().position.to_array(), [100.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_lap_is_dropped() {
        let doc = document(vec![driver(
            "NOR",
            4,
            vec![
                lap(1, vec![sample(0.0, 0.0), sample(10.0, 100.0)]),
                lap(2, vec![]),
            ],
        )]);
        let session = load_value(&doc).unwrap();
        let nor = session.driver("NOR").unwrap();

        assert_eq!(nor.laps().len(), 1);
        assert!(nor.lap(2).is_none());
    }

    #[test]
    fn test_driver_without_samples_is_dropped() {
        let doc = document(vec![
            driver("NOR", 4, vec![lap(1, vec![sample(0.0, 0.0)])]),
            driver("PIA", 81, vec![lap(1, vec![])]),
            driver("SAI", 55, vec![]),
        ]);
        let session = load_value(&doc).unwrap();

        assert_eq!(session.driver_codes(), vec!["NOR"]);
    }

    #[test]
    fn test_all_samples_empty_is_empty_session() {
        let doc = document(vec![
            driver("NOR", 4, vec![lap(1, vec![]), lap(2, vec![])]),
            driver("PIA", 81, vec![lap(1, vec![])]),
        ]);
        assert!(matches!(load_value(&doc), Err(LoadError::EmptySession)));
    }

    #[test]
    fn test_no_drivers_is_empty_session() {
        assert!(matches!(load_value(&document(vec![])), Err(LoadError::EmptySession)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = parse_error(load(b"{\"year\": 2024,"));
        assert_eq!(err.path, "$");
    }

    #[test]
    fn test_missing_top_level_field() {
        let mut doc = document(vec![]);
        doc.as_object_mut().unwrap().remove("circuit_short");

        let err = parse_error(load_value(&doc));
        assert_eq!(err.path, "$");
        assert!(err.reason.contains("circuit_short"), "{}", err.reason);
    }

    #[test]
    fn test_missing_sample_field_reports_path() {
        let mut bad = sample(5.0, 1.0);
        bad.as_object_mut().unwrap().remove("gear");
        let doc = document(vec![
            driver("NOR", 4, vec![lap(1, vec![sample(0.0, 0.0)])]),
            driver("PIA", 81, vec![lap(1, vec![sample(0.0, 0.0)]), lap(2, vec![sample(1.0, 0.0), bad])]),
        ]);

        let err = parse_error(load_value(&doc));
        assert_eq!(err.path, "drivers[1].laps[1].samples[1]");
        assert!(err.reason.contains("gear"), "{}", err.reason);
    }

    #[test]
    fn test_optional_lap_fields() {
        let doc = document(vec![driver(
            "NOR",
            4,
            vec![json!({
                "number": 1,
                "lap_time": null,
                "samples": [sample(0.0, 0.0)]
            })],
        )]);
        let session = load_value(&doc).unwrap();
        let lap = session.driver("NOR").unwrap().lap(1).unwrap();

        assert_eq!(lap.lap_time, None);
        assert_eq!(lap.sector_times, [None, None, None]);
        assert!(lap.is_valid);
    }

    #[test]
    fn test_rfc3339_date() {
        let mut doc = document(vec![driver("NOR", 4, vec![lap(1, vec![sample(0.0, 0.0)])])]);
        doc["date"] = json!("2024-10-19T22:00:00+02:00");

        let session = load_value(&doc).unwrap();
        assert_eq!(session.date.to_rfc3339(), "2024-10-19T20:00:00+00:00");
    }

    #[test]
    fn test_bad_date() {
        let mut doc = document(vec![driver("NOR", 4, vec![lap(1, vec![sample(0.0, 0.0)])])]);
        doc["date"] = json!("last sunday");

        assert_eq!(parse_error(load_value(&doc)).path, "date");
    }

    #[test]
    fn test_unknown_session_type() {
        let mut doc = document(vec![driver("NOR", 4, vec![lap(1, vec![sample(0.0, 0.0)])])]);
        doc["session_type"] = json!("Warmup");

        assert!(matches!(load_value(&doc), Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_unordered_samples_are_sorted() {
        let doc = document(vec![driver(
            "NOR",
            4,
            vec![lap(1, vec![sample(2.0, 20.0), sample(0.0, 0.0), sample(1.0, 10.0)])],
        )]);
        let session = load_value(&doc).unwrap();
        let samples = session.driver("NOR").unwrap().laps()[0].samples();

        let xs: Vec<f32> = samples.iter().map(|s| s.position.x.0).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_time_base_is_normalized() {
        let doc = document(vec![
            driver("NOR", 4, vec![lap(1, vec![sample(3605.0, 0.0), sample(3700.0, 1.0)])]),
            driver("PIA", 81, vec![lap(1, vec![sample(3600.0, 0.0), sample(3690.0, 1.0)])]),
        ]);
        let session = load_value(&doc).unwrap();

        assert_eq!(session.driver("PIA").unwrap().laps()[0].first_time(), Seconds(0.0));
        assert_eq!(session.driver("NOR").unwrap().laps()[0].first_time(), Seconds(5.0));
        assert_eq!(session.driver("NOR").unwrap().laps()[0].last_time(), Seconds(100.0));
    }

    #[test]
    fn test_pedal_values_are_clamped() {
        let mut glitch = sample(0.0, 0.0);
        glitch["throttle"] = json!(104);
        let doc = document(vec![driver("NOR", 4, vec![lap(1, vec![glitch])])]);

        let session = load_value(&doc).unwrap();
        assert_eq!(session.driver("NOR").unwrap().laps()[0].samples()[0].throttle, 100);
    }

    #[test]
    fn test_negative_speed_is_parse_error() {
        let mut bad = sample(0.0, 0.0);
        bad["speed"] = json!(-5);
        let doc = document(vec![driver("NOR", 4, vec![lap(1, vec![bad])])]);

        assert_eq!(parse_error(load_value(&doc)).path, "drivers[0].laps[0].samples[0]");
    }

    #[test]
    fn test_drs_accepts_raw_codes() {
        let mut open = sample(0.0, 0.0);
        open["drs"] = json!(12);
        let mut available = sample(1.0, 0.0);
        available["drs"] = json!(8);
        let doc = document(vec![driver("NOR", 4, vec![lap(1, vec![open, available])])]);

        let session = load_value(&doc).unwrap();
        let samples = session.driver("NOR").unwrap().laps()[0].samples();
        assert_eq!(samples[0].drs, DrsState::Active);
        assert_eq!(samples[1].drs, DrsState::Off);
    }

    #[test]
    fn test_duplicate_driver_code() {
        let doc = document(vec![
            driver("NOR", 4, vec![lap(1, vec![sample(0.0, 0.0)])]),
            driver("NOR", 44, vec![lap(1, vec![sample(0.0, 0.0)])]),
        ]);
        assert_eq!(parse_error(load_value(&doc)).path, "drivers[1].driver.code");
    }

    #[test]
    fn test_duplicate_car_number() {
        let doc = document(vec![
            driver("NOR", 4, vec![lap(1, vec![sample(0.0, 0.0)])]),
            driver("PIA", 4, vec![lap(1, vec![sample(0.0, 0.0)])]),
        ]);
        assert_eq!(parse_error(load_value(&doc)).path, "drivers[1].driver.number");
    }

    #[test]
    fn test_duplicate_lap_number() {
        let doc = document(vec![driver(
            "NOR",
            4,
            vec![lap(3, vec![sample(0.0, 0.0)]), lap(3, vec![sample(1.0, 0.0)])],
        )]);
        assert_eq!(parse_error(load_value(&doc)).path, "drivers[0].laps[1].number");
    }

    #[test]
    fn test_lap_number_zero() {
        let doc = document(vec![driver("NOR", 4, vec![lap(0, vec![sample(0.0, 0.0)])])]);
        assert_eq!(parse_error(load_value(&doc)).path, "drivers[0].laps[0].number");
    }

    #[test]
    fn test_bad_team_color() {
        let mut entry = driver("NOR", 4, vec![lap(1, vec![sample(0.0, 0.0)])]);
        entry["driver"]["team_color"] = json!("#nan");
        let doc = document(vec![entry]);

        assert_eq!(parse_error(load_value(&doc)).path, "drivers[0].driver.team_color");
    }
}

//! Integration tests for JSON file sources and the session catalog

use gp_core::LoadError;
use gp_sources::catalog::discover;
use gp_sources::{DemoSource, JsonFileSource, SessionSource};
use std::fs;
use tempfile::TempDir;

fn write_demo(dir: &TempDir, file_name: &str) -> std::path::PathBuf {
    let path = dir.path().join(file_name);
    let document = DemoSource::new().with_drivers(2).with_laps(1).document();
    fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();
    path
}

#[test]
fn test_json_file_source_loads_document() {
    let dir = TempDir::new().unwrap();
    let path = write_demo(&dir, "2025_demo_race.json");

    let source = JsonFileSource::new(&path);
    assert_eq!(source.name(), "2025_demo_race.json");
    assert_eq!(source.path(), path.as_path());

    let session = source.load().expect("file should load");
    assert_eq!(session.driver_codes(), vec!["RIV", "CHE"]);
}

#[test]
fn test_json_file_source_missing_file() {
    let dir = TempDir::new().unwrap();
    let source = JsonFileSource::new(dir.path().join("nope.json"));

    let err = source.load().unwrap_err();
    assert!(err.to_string().contains("Failed to read session file"));
}

#[test]
fn test_json_file_source_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, b"{\"year\": 2025").unwrap();

    let err = JsonFileSource::new(&path).load().unwrap_err();
    let load_error = err
        .downcast_ref::<LoadError>()
        .expect("root cause should be a LoadError");
    assert!(matches!(load_error, LoadError::Parse(_)));
}

#[test]
fn test_discover_lists_json_sorted() {
    let dir = TempDir::new().unwrap();
    write_demo(&dir, "2025_monza_race.json");
    write_demo(&dir, "2025_austin_q.json");
    fs::write(dir.path().join("notes.txt"), b"not a session").unwrap();
    fs::create_dir(dir.path().join("archive.json")).unwrap();

    let sessions = discover(dir.path()).unwrap();
    let names: Vec<&str> = sessions.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["2025 Austin Q", "2025 Monza Race"]);
    assert!(sessions[0].path.ends_with("2025_austin_q.json"));
}

#[test]
fn test_discover_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let sessions = discover(&dir.path().join("missing")).unwrap();
    assert!(sessions.is_empty());
}

use std::path::Path;
use std::process::{Command, Output};

fn run_with(dir: &Path, json: &str) -> Output {
    let path = dir.join("parameters.json");
    std::fs::write(&path, json).unwrap();
    Command::new(env!("CARGO_BIN_EXE_cubesphere")).arg(&path).env("RUST_LOG", "warn").output().unwrap()
}

#[test]
fn unknown_test_case_exits_with_status_one() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_with(dir.path(), r#"{"test_case": 9}"#);
    assert_eq!(out.status.code(), Some(1));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("unknown test case"), "stderr: {err}");
}

#[test]
fn unknown_sub_case_exits_with_status_one() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_with(dir.path(), r#"{"test_case": 5, "advection": {"tc": 4}}"#);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown test case"));
}

#[test]
fn unreadable_parameter_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_with(dir.path(), "{ not json");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("reading"));
}

#[test]
fn grid_generation_prints_summary_and_fills_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("grids");
    let json = format!(
        r#"{{"test_case": 1, "n": 4, "projection": "conformal", "show_on_screen": true, "cache_dir": {}}}"#,
        serde_json::to_string(&cache).unwrap()
    );
    let out = run_with(dir.path(), &json);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(r#""projection": "conformal""#), "stdout: {stdout}");
    assert!(cache.join("cs_4_conformal.bin").exists());
}

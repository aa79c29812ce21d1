// CLI integration tests: load a session export, filter, re-classify, render
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Four request records, the two POSTs to /api/pay 100ms apart
const SESSION_NDJSON: &str = r#"{"id":1,"transportKind":"request","method":"GET","url":"https://shop.test/login","timestampIso":"2024-05-01T10:00:00.000Z","monotonicStart":0.0,"status":200,"statusText":"OK","durationMs":5.0,"responseSizeBytes":2048,"initiator":"app.js:10","tags":["Auth"]}
{"id":2,"transportKind":"request","method":"POST","url":"https://shop.test/api/pay","requestBodyPreview":"amount=10","timestampIso":"2024-05-01T10:00:01.000Z","monotonicStart":1000.0,"status":200,"durationMs":20.0,"initiator":"pay.js:4","tags":[]}
{"id":3,"transportKind":"request","method":"POST","url":"https://shop.test/api/pay","requestBodyPreview":"amount=10","timestampIso":"2024-05-01T10:00:01.100Z","monotonicStart":1100.0,"status":200,"durationMs":20.0,"initiator":"pay.js:4","tags":[]}
{"id":4,"transportKind":"stream","method":"GET","url":"https://shop.test/go?redirect=https://evil.test","timestampIso":"2024-05-01T10:00:02.000Z","monotonicStart":2000.0,"status":502,"durationMs":3.0,"initiator":"nav.js:1","tags":["Input","Error"]}
{"id":5,"transportKind":"socket-message","method":"SEND","url":"wss://shop.test/live","requestBodyPreview":"hi","timestampIso":"2024-05-01T10:00:03.000Z","monotonicStart":3000.0,"tags":["Events"]}
"#;

fn write_session(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("session.ndjson");
    fs::write(&path, SESSION_NDJSON).unwrap();
    path
}

fn sonda() -> Command {
    Command::cargo_bin("sonda").unwrap()
}

#[test]
fn test_table_is_default_output() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://shop.test/login"))
        .stdout(predicate::str::contains("app.js:10"))
        .stdout(predicate::str::contains("4 requests"))
        .stdout(predicate::str::contains("wss://").not());
}

#[test]
fn test_tag_filter() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .arg("-e")
        .arg("tag=Auth")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("/login"))
        .stdout(predicate::str::contains("/api/pay").not())
        .stdout(predicate::str::contains("1 requests"));
}

#[test]
fn test_filtered_table_keeps_log_index() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .args(["-e", "tag=Input"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("    3 stream "))
        .stdout(predicate::str::contains("    0 stream ").not())
        .stdout(predicate::str::contains("1 requests"));
}

#[test]
fn test_combined_filters() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .args(["-e", "kind=request;method=post", "-e", "url=/pay$/"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 requests"));
}

#[test]
fn test_invalid_filter_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .args(["-e", "color=red"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid filter expression"));
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();

    sonda()
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_garbage_input_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{not json").unwrap();

    sonda()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid session export"));
}

#[test]
fn test_reads_stdin() {
    sonda()
        .arg("-")
        .args(["--format", "summary"])
        .write_stdin(SESSION_NDJSON)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 Auth"))
        .stdout(predicate::str::contains("1 message"))
        .stdout(predicate::str::contains("5 total"));
}

#[test]
fn test_reclassify_finds_race() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .arg("--reclassify")
        .args(["-e", "tag=Async", "--format", "csv"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("time,kind,method,status"))
        .stdout(predicate::str::contains("2024-05-01T10:00:01.100Z,request,POST"))
        .stdout(predicate::str::contains("10:00:01.000Z").not());
}

#[test]
fn test_reclassify_zero_window_has_no_race() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .args(["--reclassify", "--race-window-ms", "0", "--format", "summary"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Async").not());
}

#[test]
fn test_reclassify_with_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);
    let config = dir.path().join("sonda.toml");
    fs::write(&config, "large_response_kb = 2\n").unwrap();

    sonda()
        .arg("--reclassify")
        .arg("--config")
        .arg(&config)
        .args(["-e", "tag=Memory", "--format", "ndjson"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"url\":\"https://shop.test/login\""))
        .stdout(predicate::str::contains("Memory"))
        .stdout(predicate::str::contains("/api/pay").not());
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .args(["--reclassify", "--race-window-ms=-5"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("race_window_ms"));
}

#[test]
fn test_har_output() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    let output = sonda()
        .args(["--format", "har"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let har: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = har["log"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3]["_tags"], serde_json::json!(["Input", "Error"]));
}

#[test]
fn test_curl_output() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir);

    sonda()
        .args(["--format", "curl", "-e", "method=POST"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("curl 'https://shop.test/api/pay'"))
        .stdout(predicate::str::contains("--data-raw 'amount=10'"));
}

#[test]
fn test_json_array_input() {
    let dir = TempDir::new().unwrap();
    let records: Vec<serde_json::Value> = SESSION_NDJSON
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let path = dir.path().join("session.json");
    fs::write(&path, serde_json::to_string_pretty(&records).unwrap()).unwrap();

    sonda()
        .args(["--format", "json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["))
        .stdout(predicate::str::contains("\"transportKind\": \"socket-message\""));
}

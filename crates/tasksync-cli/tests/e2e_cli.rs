//! E2E tests for the `tsk` binary: local validation, config, preferences,
//! and single-request exchanges against a throwaway HTTP listener.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread::{self, JoinHandle};
use tempfile::TempDir;

fn tsk_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tsk"));
    cmd.env("HOME", home);
    cmd.env("XDG_CONFIG_HOME", home.join("config"));
    cmd.env("XDG_DATA_HOME", home.join("data"));
    cmd.env("TASKSYNC_LOG", "error");
    cmd.env_remove("TASKSYNC_TOKEN");
    cmd.env_remove("TASKSYNC_BASE_URL");
    cmd.env_remove("FORMAT");
    cmd
}

/// Answer exactly one request, then hand back its request line.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/api", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).unwrap();
            if header == "\r\n" || header.is_empty() {
                break;
            }
        }
        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();
        request_line
    });
    (base_url, handle)
}

const PAGE: &str = r#"{"success":true,"data":{"data":[{"id":1,"name":"Write report","description":null,"status":"In Progress","due_date":"2025-03-12","created_at":"2025-01-02 10:00:00"},{"id":2,"name":"Pay rent","description":"before the 5th","status":"Done","due_date":null,"created_at":"2025-01-01 09:00:00"}],"current_page":1,"last_page":1,"per_page":10,"total":2}}"#;

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    tsk_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("board"))
        .stdout(predicate::str::contains("move"));
}

#[test]
fn unreachable_server_reports_network_error() {
    let home = TempDir::new().unwrap();
    tsk_cmd(home.path())
        .args(["list", "--base-url", "http://127.0.0.1:9/api", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn json_errors_carry_code() {
    let home = TempDir::new().unwrap();
    let output = tsk_cmd(home.path())
        .args(["show", "5", "--base-url", "http://127.0.0.1:9/api", "--format", "json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"error_code\": \"E2001\""), "stderr: {stderr}");
}

#[test]
fn blank_name_rejected_before_sending() {
    let home = TempDir::new().unwrap();
    tsk_cmd(home.path())
        .args(["create", "   ", "--base-url", "http://127.0.0.1:9/api", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E4001"))
        .stderr(predicate::str::contains("The name field is required."));
}

#[test]
fn update_without_fields_is_refused() {
    let home = TempDir::new().unwrap();
    tsk_cmd(home.path())
        .args(["update", "3", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to update"));
}

#[test]
fn invalid_due_date_rejected_by_parser() {
    let home = TempDir::new().unwrap();
    tsk_cmd(home.path())
        .args(["create", "Ship", "--due", "next week"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a date"));
}

#[test]
fn config_path_honors_xdg() {
    let home = TempDir::new().unwrap();
    tsk_cmd(home.path())
        .args(["config", "path", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tasksync/config.toml"));
}

#[test]
fn broken_config_file_reports_config_code() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("config/tasksync");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[client\nbase_url = ").unwrap();
    tsk_cmd(home.path())
        .args(["config", "show", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error_code\": \"E1001\""));
}

#[test]
fn config_show_merges_env_and_masks_token() {
    let home = TempDir::new().unwrap();
    let output = tsk_cmd(home.path())
        .env("TASKSYNC_BASE_URL", "https://tasks.example.com/api")
        .env("TASKSYNC_TOKEN", "s3cret")
        .args(["config", "show", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let config: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(config["client"]["base_url"], "https://tasks.example.com/api");
    assert_eq!(config["client"]["token"], "<redacted>");
}

#[test]
fn prefs_view_is_remembered() {
    let home = TempDir::new().unwrap();
    tsk_cmd(home.path())
        .args(["prefs", "view", "board", "--format", "text"])
        .assert()
        .success();
    tsk_cmd(home.path())
        .args(["prefs", "show", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("view\tboard"));
    assert!(home.path().join("data/tasksync/preferences.json").is_file());

    tsk_cmd(home.path())
        .args(["prefs", "reset", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("view\tlist"));
}

#[test]
fn list_renders_server_page_as_json() {
    let home = TempDir::new().unwrap();
    let (base_url, server) = serve_once("200 OK", PAGE);
    let output = tsk_cmd(home.path())
        .args(["list", "--base-url", &base_url, "--sort", "name", "--asc", "--format", "json"])
        .output()
        .unwrap();
    let request_line = server.join().unwrap();
    assert!(
        output.status.success(),
        "list failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(request_line.starts_with("GET /api/tasks?"));
    assert!(request_line.contains("sort_by=name"));
    assert!(request_line.contains("sort_direction=asc"));

    let list: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let tasks = list["tasks"].as_array().expect("tasks array");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["name"], "Write report");
    assert_eq!(list["meta"]["total"], 2);
}

#[test]
fn board_groups_server_page() {
    let home = TempDir::new().unwrap();
    let (base_url, server) = serve_once("200 OK", PAGE);
    tsk_cmd(home.path())
        .args(["board", "--base-url", &base_url, "--format", "pretty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("To Do (0)"))
        .stdout(predicate::str::contains("In Progress (1)"))
        .stdout(predicate::str::contains("Done (1)"));
    server.join().unwrap();
}

#[test]
fn rejected_token_reports_auth_error() {
    let home = TempDir::new().unwrap();
    let (base_url, server) = serve_once("401 Unauthorized", r#"{"message":"Unauthenticated."}"#);
    tsk_cmd(home.path())
        .args(["list", "--base-url", &base_url, "--token", "stale", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3001"));
    server.join().unwrap();
}

//! Binary-level tests: run `hsync` against a mock DiMe server.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn hsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("hsync");
    path
}

type Received = Arc<Mutex<Vec<Value>>>;

async fn ping() -> StatusCode {
    StatusCode::OK
}

async fn store_event(
    State(received): State<Received>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    if !headers.contains_key("authorization") {
        return StatusCode::UNAUTHORIZED;
    }
    received.lock().unwrap().push(body);
    StatusCode::OK
}

/// Start a mock DiMe server; returns its base API URL and received events.
async fn start_mock_dime() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/ping", post(ping))
        .route("/api/data/event", post(store_event))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (format!("http://{}/api", addr), received)
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    format!("http://127.0.0.1:{}/api", port)
}

async fn write_firefox_history(path: &Path) {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::query("CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT, title TEXT)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE moz_historyvisits (id INTEGER PRIMARY KEY, place_id INTEGER, visit_date INTEGER)",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO moz_places (id, url, title) VALUES (1, 'http://a.com', 'A'), (2, 'http://b.com/x.txt', 'B'), (3, 'http://localhost:8080/api', 'DiMe')",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO moz_historyvisits (place_id, visit_date) VALUES (1, 1456833800000000), (1, 1456833700000000), (2, 1456833600000000), (3, 1456833500000000)",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
}

fn setup_test_env(sink_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[state]
path = "{root}/data/hsync.sqlite"

[sink]
url = "{sink}"
username = "testuser"
password = "testuser123"
timeout_secs = 5

[sync]
hostname = "testhost"

[loggers.firefox]
history_file = "{root}/places.sqlite"
max_events = 100
denylist = ["*://localhost*"]
"#,
        root = root.display(),
        sink = sink_url,
    );

    let config_path = config_dir.join("hsync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

async fn run_hsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = hsync_binary();
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    tokio::task::spawn_blocking(move || {
        let output = Command::new(&binary)
            .arg("--config")
            .arg(&config_path)
            .args(&args)
            .output()
            .unwrap_or_else(|e| panic!("Failed to run hsync binary at {:?}: {}", binary, e));

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        (stdout, stderr, output.status.success())
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env(&closed_port_url());

    let (stdout, stderr, success) = run_hsync(&config_path, &["init"]).await;
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_hsync(&config_path, &["init"]).await;
    assert!(success, "Second init failed (not idempotent)");
}

#[tokio::test]
async fn test_sync_delivers_then_noops() {
    let (url, received) = start_mock_dime().await;
    let (tmp, config_path) = setup_test_env(&url);
    write_firefox_history(&tmp.path().join("places.sqlite")).await;

    let (stdout, stderr, success) = run_hsync(&config_path, &["sync", "firefox"]).await;
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("events sent: 3"), "stdout={}", stdout);
    assert!(stdout.contains("filtered: 1"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));

    {
        let events = received.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["@type"], "DesktopEvent");
        assert_eq!(events[0]["origin"], "testhost");
        assert_eq!(events[0]["targettedResource"]["uri"], "http://a.com");
        assert!(events[1]["targettedResource"].get("uri").is_none());
        assert_eq!(
            events[0]["targettedResource"]["id"],
            events[1]["targettedResource"]["id"]
        );
        assert_eq!(events[2]["targettedResource"]["mimeType"], "text/plain");
    }

    let (stdout, _, success) = run_hsync(&config_path, &["sync", "firefox"]).await;
    assert!(success);
    assert!(stdout.contains("history not changed"), "stdout={}", stdout);
    assert_eq!(received.lock().unwrap().len(), 3);

    let (stdout, _, success) = run_hsync(&config_path, &["status", "firefox"]).await;
    assert!(success);
    assert!(stdout.contains("firefox"));
}

#[tokio::test]
async fn test_unreachable_sink_exits_zero() {
    let (tmp, config_path) = setup_test_env(&closed_port_url());
    write_firefox_history(&tmp.path().join("places.sqlite")).await;

    let (stdout, stderr, success) = run_hsync(&config_path, &["sync", "firefox"]).await;
    assert!(success, "stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("no connection"), "stdout={}", stdout);
}

#[tokio::test]
async fn test_missing_history_exits_nonzero() {
    let (url, received) = start_mock_dime().await;
    let (_tmp, config_path) = setup_test_env(&url);

    let (_, stderr, success) = run_hsync(&config_path, &["sync", "firefox"]).await;
    assert!(!success, "sync should fail without a history file");
    assert!(stderr.contains("unavailable"), "stderr={}", stderr);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_logger_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env(&closed_port_url());
    let (_, stderr, success) = run_hsync(&config_path, &["sync", "opera"]).await;
    assert!(!success);
    assert!(stderr.contains("opera"));
}

#[tokio::test]
async fn test_loggers_reports_health() {
    let (tmp, config_path) = setup_test_env(&closed_port_url());

    let (stdout, _, success) = run_hsync(&config_path, &["loggers"]).await;
    assert!(success);
    assert!(stdout.contains("MISSING"));

    write_firefox_history(&tmp.path().join("places.sqlite")).await;
    let (stdout, _, success) = run_hsync(&config_path, &["loggers"]).await;
    assert!(success);
    assert!(stdout.contains("firefox"));
    assert!(stdout.contains("OK"));
}

#[tokio::test]
async fn test_prune_then_resync_reads_again() {
    let (url, received) = start_mock_dime().await;
    let (tmp, config_path) = setup_test_env(&url);
    write_firefox_history(&tmp.path().join("places.sqlite")).await;

    run_hsync(&config_path, &["sync", "firefox"]).await;
    assert_eq!(received.lock().unwrap().len(), 3);

    let (stdout, stderr, success) =
        run_hsync(&config_path, &["prune", "firefox", "--max-events", "1"]).await;
    assert!(success, "prune failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("events forgotten: 2"), "stdout={}", stdout);

    // Fingerprint was cleared, so the source is read again and the two
    // forgotten events are re-sent.
    let (stdout, _, success) = run_hsync(&config_path, &["sync", "firefox"]).await;
    assert!(success);
    assert!(stdout.contains("events sent: 2"), "stdout={}", stdout);
}

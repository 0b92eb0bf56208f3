//! CLI tests against a mock broker.
//!
//! Each test runs the `kiteauth` binary with an isolated session directory
//! and a scrubbed credential environment.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREDENTIAL_VARS: &[&str] = &[
    "API_KEY",
    "API_SECRET",
    "USER_ID",
    "PASSWORD",
    "TOTP_SECRET",
    "REDIRECT_URI",
    "KITEAUTH_SESSION_DIR",
    "KITEAUTH_LOGIN_URL",
    "KITEAUTH_API_URL",
    "KITEAUTH_ENV_PREFIX",
    "RUST_LOG",
];

/// Build a CLI command that cannot see the caller's credentials or `.env`.
fn cli(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kiteauth"));
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(home);
    cmd.arg("--session-dir").arg(home.join("sessions"));
    cmd
}

fn with_credentials(cmd: &mut Command, server_uri: &str) {
    cmd.env("API_KEY", "kitekey")
        .env("API_SECRET", "kitesecret")
        .env("USER_ID", "AB1234")
        .env("PASSWORD", "hunter2")
        .env("TOTP_SECRET", "JBSWY3DPEHPK3PXP")
        .env("KITEAUTH_LOGIN_URL", server_uri)
        .env("KITEAUTH_API_URL", server_uri);
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Run a blocking command without stalling the mock server's runtime.
async fn run(mut cmd: Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().expect("Failed to execute CLI"))
        .await
        .unwrap()
}

async fn mock_broker(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"request_id": "req-1", "twofa_type": "totp"}
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/twofa"))
        .and(body_string_contains("request_id=req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {}
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/connect/login"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "Location",
            "https://127.0.0.1/?status=success&request_token=rt-cli",
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session/token"))
        .and(body_string_contains("request_token=rt-cli"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"user_id": "AB1234", "user_name": "Test User", "access_token": "at-cli"}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("authorization", "token kitekey:at-cli"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"user_id": "AB1234", "user_name": "Test User"}
        })))
        .mount(server)
        .await;
}

#[test]
fn test_login_without_credentials_fails_fast() {
    let home = TempDir::new().unwrap();

    let mut cmd = cli(home.path());
    // nothing listens here; credentials must fail first
    cmd.args(["--login-url", "http://127.0.0.1:9", "--api-url", "http://127.0.0.1:9"]);
    cmd.arg("login");
    let output = cmd.output().unwrap();

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Invalid credentials"), "stderr: {}", err);
    assert!(err.contains("missing api_key"), "stderr: {}", err);
}

#[test]
fn test_status_with_no_session() {
    let home = TempDir::new().unwrap();

    let output = cli(home.path())
        .args(["status", "--user-id", "AB1234", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let value: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(value, json!({"userId": "AB1234", "persisted": false}));
}

#[test]
fn test_status_requires_user_id() {
    let home = TempDir::new().unwrap();

    let output = cli(home.path()).arg("status").output().unwrap();

    assert!(!output.status.success());
    assert!(stderr(&output).contains("--user-id"));
}

#[test]
fn test_totp_prints_six_digits() {
    let home = TempDir::new().unwrap();

    let output = cli(home.path())
        .env("TOTP_SECRET", "JBSWY3DPEHPK3PXP")
        .arg("totp")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let code = stdout(&output).trim().to_string();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn test_totp_honors_env_prefix() {
    let home = TempDir::new().unwrap();

    let output = cli(home.path())
        .env("KITE_TOTP_SECRET", "JBSWY3DPEHPK3PXP")
        .args(["--env-prefix", "KITE_", "totp", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let value: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(value["code"].as_str().unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_login_then_request_then_logout() {
    let server = MockServer::start().await;
    mock_broker(&server).await;
    let home = TempDir::new().unwrap();

    // login runs the handshake and persists the session
    let mut cmd = cli(home.path());
    with_credentials(&mut cmd, &server.uri());
    cmd.args(["login", "--json"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(report["status"], "logged_in");
    assert_eq!(report["isAuthenticated"], true);
    assert_eq!(report["restored"], false);
    assert_eq!(report["session"]["userId"], "AB1234");
    assert!(!stdout(&output).contains("at-cli"));
    assert!(home.path().join("sessions").join("AB1234.json").exists());

    // status reads the record offline
    let mut cmd = cli(home.path());
    with_credentials(&mut cmd, &server.uri());
    cmd.args(["status", "--json"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let status: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(status["persisted"], true);
    assert_eq!(status["expired"], false);

    // a second login reuses the persisted session
    let mut cmd = cli(home.path());
    with_credentials(&mut cmd, &server.uri());
    cmd.args(["login", "--json"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let report: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(report["restored"], true);
    assert_eq!(report["status"], "logged_in");

    // request restores the session (no second TOTP) and proxies the call
    Mock::given(method("GET"))
        .and(path("/user/margins"))
        .and(header("authorization", "token kitekey:at-cli"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"equity": {"net": 1000.0}}
        })))
        .mount(&server)
        .await;

    let mut cmd = cli(home.path());
    with_credentials(&mut cmd, &server.uri());
    cmd.args(["request", "GET", "/user/margins", "--compact"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let margins: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(margins["equity"]["net"], 1000.0);

    // logout revokes the token and removes the record
    Mock::given(method("DELETE"))
        .and(path("/session/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = cli(home.path());
    with_credentials(&mut cmd, &server.uri());
    cmd.arg("logout");
    let output = run(cmd).await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!home.path().join("sessions").join("AB1234.json").exists());
}

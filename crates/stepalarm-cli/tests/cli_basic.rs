//! End-to-end tests for the stepalarm CLI binary.

use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run the CLI with an isolated config directory.
fn run_cli(dir: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_stepalarm-cli"))
        .args(args)
        .env("STEPALARM_CONFIG_DIR", dir.path())
        .env_remove("STEPALARM_LOG")
        .output()
        .expect("failed to run stepalarm-cli");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

fn json_lines(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("line is not JSON"))
        .collect()
}

fn of_type<'a>(events: &'a [Value], kind: &str) -> Vec<&'a Value> {
    events.iter().filter(|e| e["type"] == kind).collect()
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&dir, &["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("simulate"));
    assert!(stdout.contains("next"));
    assert!(stdout.contains("config"));
}

#[test]
fn test_simulate_step_scenario() {
    let dir = TempDir::new().unwrap();
    let (stdout, stderr, code) = run_cli(
        &dir,
        &[
            "simulate",
            "--modality",
            "step",
            "--goal",
            "3",
            "--samples",
            "2,2,15,2,2,15,2,2,15",
            "--interval-ms",
            "260",
        ],
    );
    assert_eq!(code, 0, "stderr: {stderr}");

    let events = json_lines(&stdout);
    assert_eq!(of_type(&events, "AlarmScheduled").len(), 1);
    assert_eq!(of_type(&events, "AlarmRinging").len(), 1);

    let counts: Vec<u64> = of_type(&events, "ProgressAdvanced")
        .iter()
        .map(|e| e["count"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![1, 2, 3]);
    assert_eq!(of_type(&events, "AlarmCompleted").len(), 1);

    let snapshot = events.last().unwrap();
    assert_eq!(snapshot["type"], "StateSnapshot");
    assert_eq!(snapshot["state"], "completed");
    assert_eq!(snapshot["count"], 3);
}

#[test]
fn test_simulate_blink_scenario() {
    let dir = TempDir::new().unwrap();
    let (stdout, stderr, code) = run_cli(
        &dir,
        &[
            "simulate",
            "--modality",
            "blink",
            "--goal",
            "1",
            "--samples",
            "150,150,150,150,150,60,60,60,150,150,150,150,150,150,150",
            "--interval-ms",
            "33",
        ],
    );
    assert_eq!(code, 0, "stderr: {stderr}");

    let events = json_lines(&stdout);
    assert_eq!(of_type(&events, "ProgressAdvanced").len(), 1);
    assert_eq!(events.last().unwrap()["state"], "completed");
}

#[test]
fn test_simulate_too_few_steps_keeps_ringing() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(
        &dir,
        &["simulate", "--goal", "5", "--samples", "2,2,15,2,2,15"],
    );
    assert_eq!(code, 0);

    let events = json_lines(&stdout);
    assert_eq!(of_type(&events, "ProgressAdvanced").len(), 2);
    assert!(of_type(&events, "AlarmCompleted").is_empty());
    assert_eq!(events.last().unwrap()["state"], "ringing");
}

#[test]
fn test_simulate_acknowledge_requires_manual_stop() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(
        &dir,
        &[
            "simulate",
            "--goal",
            "1",
            "--samples",
            "2,2,15",
            "--acknowledge",
        ],
    );
    assert_eq!(code, 0);

    let events = json_lines(&stdout);
    assert_eq!(of_type(&events, "GoalReached").len(), 1);
    assert_eq!(of_type(&events, "AlarmDismissed").len(), 1);
    assert_eq!(events.last().unwrap()["state"], "completed");
}

#[test]
fn test_simulate_counter_source() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(
        &dir,
        &[
            "simulate",
            "--goal",
            "3",
            "--source",
            "counter",
            "--samples",
            "1000,1001,1003",
        ],
    );
    assert_eq!(code, 0);

    let events = json_lines(&stdout);
    assert_eq!(of_type(&events, "AlarmCompleted").len(), 1);
}

#[test]
fn test_simulate_show_alerts() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(
        &dir,
        &["simulate", "--goal", "1", "--samples", "2,2,15", "--show-alerts"],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("\"call\":\"indicator_shown\""));
    assert!(stdout.contains("\"call\":\"indicator_cleared\""));
}

#[test]
fn test_simulate_zero_goal_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["simulate", "--goal", "0", "--samples", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_next_prints_future_time() {
    let dir = TempDir::new().unwrap();
    let (stdout, stderr, code) = run_cli(&dir, &["next", "--at", "07:30"]);
    assert_eq!(code, 0, "stderr: {stderr}");

    let next = chrono::DateTime::parse_from_rfc3339(stdout.trim()).unwrap();
    assert!(next > chrono::Utc::now());
    assert!(next.to_rfc3339().contains("07:30:00"));
}

#[test]
fn test_next_rejects_bad_time() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["next", "--at", "25:00"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("invalid time"));
}

#[test]
fn test_config_set_then_get() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&dir, &["config", "set", "engine.default_goal", "12"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (stdout, _, code) = run_cli(&dir, &["config", "get", "engine.default_goal"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "12");
}

#[test]
fn test_config_unknown_key() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["config", "get", "nonexistent.key"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_list_and_reset() {
    let dir = TempDir::new().unwrap();
    run_cli(&dir, &["config", "set", "alert.beep_on_ms", "400"]);

    let (stdout, _, code) = run_cli(&dir, &["config", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("alert.beep_on_ms = 400"));

    let (_, _, code) = run_cli(&dir, &["config", "reset"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(&dir, &["config", "get", "alert.beep_on_ms"]);
    assert_eq!(stdout.trim(), "800");
}

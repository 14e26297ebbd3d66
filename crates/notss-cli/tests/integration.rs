#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn eh() -> Command {
    let mut cmd = Command::cargo_bin("notss-eh").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Event flags for host web01 / service HTTP.
fn event(state: &str, state_type: &str, attempt: u32) -> Vec<String> {
    [
        "-H", "127.0.0.1", "-n", "web01", "-d", "HTTP", "-s", state, "-t", state_type, "-a",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain([attempt.to_string()])
    .collect()
}

fn append_to(file: &Path, word: &str) -> String {
    format!("echo {word} >> {}", file.display())
}

fn lines(file: &Path) -> Vec<String> {
    std::fs::read_to_string(file)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ---------------------------------------------------------------------------
// trigger decisions end to end
// ---------------------------------------------------------------------------

#[test]
fn hard_critical_runs_the_critical_action() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", &append_to(&out, "restart-service")])
        .args(["-w", &append_to(&out, "wrong-list")])
        .arg("shell")
        .assert()
        .success();

    assert_eq!(lines(&out), ["restart-service"]);
}

#[test]
fn attempt_mismatch_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    eh().args(event("WARNING", "SOFT", 1))
        .args(["-A", "2"])
        .args(["-w", &append_to(&out, "restart")])
        .arg("shell")
        .assert()
        .success()
        .stderr(predicate::str::contains("did not match"));

    assert!(!out.exists());
}

#[test]
fn zero_attempt_exec_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-A", "0"])
        .args(["-c", &append_to(&out, "restart")])
        .arg("shell")
        .assert()
        .code(2);
    assert!(!out.exists());
}

#[test]
fn soft_state_runs_only_when_soft_execution_is_enabled() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    eh().args(event("UNKNOWN", "SOFT", 1))
        .args(["-u", &append_to(&out, "first")])
        .arg("shell")
        .assert()
        .success();
    assert!(!out.exists());

    eh().args(event("UNKNOWN", "SOFT", 1))
        .arg("-S")
        .args(["-u", &append_to(&out, "second")])
        .arg("shell")
        .assert()
        .success();
    assert_eq!(lines(&out), ["second"]);
}

#[test]
fn skip_keyword_means_no_action() {
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "skip"])
        .arg("shell")
        .assert()
        .code(0)
        .stderr(predicate::str::contains("no actions for state"));
}

#[test]
fn empty_only_policy_runs_the_skip_keyword() {
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["--skip-policy", "empty-only", "-c", "skip"])
        .arg("shell")
        .assert()
        .code(0)
        .stderr(predicate::str::contains("executing shell command"));
}

#[test]
fn actions_run_in_order() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    eh().args(event("OK", "HARD", 1))
        .args(["-o", &append_to(&out, "one")])
        .args(["-o", &append_to(&out, "two")])
        .args(["-o", &append_to(&out, "three")])
        .arg("shell")
        .assert()
        .success();

    assert_eq!(lines(&out), ["one", "two", "three"]);
}

#[test]
fn wait_applies_before_each_action() {
    let started = Instant::now();
    eh().args(event("OK", "HARD", 1))
        .args(["-W", "1", "-o", "true", "-o", "true"])
        .arg("shell")
        .assert()
        .success();
    assert!(started.elapsed() >= Duration::from_secs(2));
}

// ---------------------------------------------------------------------------
// exit codes
// ---------------------------------------------------------------------------

#[test]
fn failing_actions_still_exit_zero() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "exit 7", "-c", &append_to(&out, "after")])
        .args(["shell", "-r", "0"])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("return code not matched"));

    // The failure did not stop the next action.
    assert_eq!(lines(&out), ["after"]);
}

#[test]
fn missing_module_exits_two() {
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "true"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("could not find an execution module"));
}

#[test]
fn unknown_module_exits_two() {
    eh().args(event("CRITICAL", "HARD", 3))
        .arg("telnet")
        .assert()
        .code(2);
}

#[test]
fn funk_exits_three() {
    eh().args(event("OK", "HARD", 1))
        .arg("--funk")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("party time"));
}

#[test]
fn version_flag_prints_version() {
    eh().arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ---------------------------------------------------------------------------
// backends
// ---------------------------------------------------------------------------

#[test]
fn nrpe_with_missing_plugin_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let plugin = dir.path().join("check_nrpe");

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "restart_httpd"])
        .args(["nrpe", "-p", plugin.to_str().unwrap()])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("could not find the NRPE plugin"));
}

#[test]
fn nrpe_passes_host_and_encryption_flag() {
    let dir = TempDir::new().unwrap();
    let calls = dir.path().join("calls");
    let plugin = script(&dir, "check_nrpe", &format!("echo \"$*\" >> {}", calls.display()));

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "restart_httpd"])
        .args(["nrpe", "-H", "10.1.1.1", "-p", plugin.to_str().unwrap()])
        .assert()
        .success();
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "restart_httpd"])
        .args(["nrpe", "-i", "-p", plugin.to_str().unwrap()])
        .assert()
        .success();

    assert_eq!(
        lines(&calls),
        ["-H 10.1.1.1 -n -c restart_httpd", "-H 127.0.0.1 -c restart_httpd"]
    );
}

#[test]
fn ssh_rejects_key_and_password_before_connecting() {
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "uptime"])
        .args(["ssh", "-u", "monitor", "-k", "/tmp/id", "-P", "secret", "-i"])
        .assert()
        .code(2);
}

#[test]
fn ssh_with_unreadable_known_hosts_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let known = dir.path().join("known_hosts");

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "uptime"])
        .args(["ssh", "-u", "monitor", "-p", "9", "-P", "secret"])
        .args(["-K", known.to_str().unwrap()])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("known hosts"));
}

#[test]
fn verbose_logs_backend_settings_without_the_password() {
    let dir = TempDir::new().unwrap();
    let known = dir.path().join("known_hosts");

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-V", "-c", "uptime"])
        .args(["ssh", "-u", "monitor", "-p", "9", "-P", "hunter2"])
        .args(["-K", known.to_str().unwrap()])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("backend configuration"))
        .stderr(predicate::str::contains("known_hosts"))
        .stderr(predicate::str::contains("hunter2").not());
}

#[test]
fn shell_timeout_covers_forked_children() {
    let started = Instant::now();
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["--timeout", "1", "-c", "sleep 10; true"])
        .arg("shell")
        .assert()
        .code(0)
        .stderr(predicate::str::contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[test]
fn shell_without_return_code_only_logs_output() {
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "echo visible-$((40 + 2))"])
        .arg("shell")
        .assert()
        .success()
        .stderr(predicate::str::contains("visible-42"));
}

#[test]
fn muted_shell_output_is_not_logged() {
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-c", "echo secret-$((40 + 2))"])
        .args(["shell", "-m"])
        .assert()
        .success()
        .stderr(predicate::str::contains("secret-42").not());
}

#[test]
fn timeout_bounds_a_hung_action() {
    let started = Instant::now();
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["--timeout", "1", "-c", "exec sleep 10"])
        .args(["shell", "-r", "0"])
        .assert()
        .code(0);
    assert!(started.elapsed() < Duration::from_secs(8));
}

// ---------------------------------------------------------------------------
// check source and logging
// ---------------------------------------------------------------------------

#[test]
fn not_the_check_source_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let mon = script(&dir, "mon", "echo 'Merlin peer monitor02'");

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-C", "--mon-path", mon.to_str().unwrap()])
        .args(["-c", &append_to(&out, "restart")])
        .arg("shell")
        .assert()
        .code(0);
    assert!(!out.exists());
}

#[test]
fn check_source_on_this_host_runs_actions() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let mon = script(&dir, "mon", "echo 'Core Worker 4711'");

    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-C", "--mon-path", mon.to_str().unwrap()])
        .args(["-c", &append_to(&out, "restart")])
        .arg("shell")
        .assert()
        .success();
    assert_eq!(lines(&out), ["restart"]);
}

#[test]
fn logging_none_is_silent() {
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-l", "none", "-c", "echo hello"])
        .arg("shell")
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn verbose_logging_includes_debug_detail() {
    eh().args(event("CRITICAL", "HARD", 3))
        .args(["-V", "-c", "true"])
        .arg("shell")
        .assert()
        .success()
        .stderr(predicate::str::contains("command execution result checking is disabled"));
}

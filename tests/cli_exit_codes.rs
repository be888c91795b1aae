//! Exit codes of the `gps-monitor` binary for start-up failures.

use std::{
    fs,
    path::Path,
    process::{Command, Output},
};

use tempfile::TempDir;

fn run_with_config(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gps-monitor"))
        .args(args)
        .env("GPS_MONITOR_CONFIG", config)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run gps-monitor")
}

/// Config pointing at a socket that does not exist, with quiet logging.
fn isolated_config(dir: &TempDir, extra: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    let socket = dir.path().join("missing-ubus.sock");
    fs::write(
        &path,
        format!(
            "[logger]\nlevel = \"error\"\n\n[telemetry]\nsocket_path = \"{}\"\n{}",
            socket.display(),
            extra
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_missing_bus_exits_before_opening_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = isolated_config(&dir, "");
    let csv = dir.path().join("gps.csv");

    let output = run_with_config(&config, &["-l", "-o", csv.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to connect to ubus"));
    assert!(!csv.exists());
}

#[test]
fn test_conflicting_modes_fail() {
    let dir = tempfile::tempdir().unwrap();
    let config = isolated_config(&dir, "");
    assert_eq!(run_with_config(&config, &["-l", "-s"]).status.code(), Some(1));
}

#[test]
fn test_daemon_requires_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = isolated_config(&dir, "");
    assert_eq!(run_with_config(&config, &["-d"]).status.code(), Some(1));
}

#[test]
fn test_zero_interval_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = isolated_config(&dir, "");
    assert_eq!(run_with_config(&config, &["-l", "-i", "0"]).status.code(), Some(1));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = isolated_config(&dir, "\n[logging]\ninterval_secs = 0\n");

    let output = run_with_config(&config, &["-l"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least 1 second"));
}

#[test]
fn test_help_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let config = isolated_config(&dir, "");

    let output = run_with_config(&config, &["-h"]);
    assert_eq!(output.status.code(), Some(0));
    let help = String::from_utf8_lossy(&output.stdout);
    assert!(help.contains("--spi-display"));
    assert!(help.contains("timestamp,latitude,longitude,speed,elevation,course,age"));
}

//! End-to-end runs of the `check_snmp_mem` binary.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

/// Directory with no config file in it, used as `$HOME` and `$XDG_CONFIG_HOME`.
fn empty_home() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("check_snmp_mem-home-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn check_snmp_mem(args: &[&str]) -> Output {
    let home = empty_home();
    Command::new(env!("CARGO_BIN_EXE_check_snmp_mem"))
        .args(args)
        .env("HOME", &home)
        .env("XDG_CONFIG_HOME", &home)
        .env_remove("SNMPCHECK_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

/// Config pointing at a local port nobody answers on, with no retries.
fn unreachable_config(name: &str) -> PathBuf {
    let path = empty_home().join(name);
    fs::write(&path, "(port: 9, timeout_secs: 1, retries: 0)").unwrap();
    path
}

#[test]
fn test_unreachable_host_is_unknown() {
    let config = unreachable_config("unreachable.ron");
    let output = check_snmp_mem(&["-h", "127.0.0.1", "--config", config.to_str().unwrap()]);

    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(3));
    assert!(text.starts_with("UNKNOWN: "), "{}", text);
    assert_eq!(text.lines().count(), 1);
    assert!(!text.contains(" | "));
}

#[test]
fn test_unreachable_host_json() {
    let config = unreachable_config("unreachable-json.ron");
    let output = check_snmp_mem(&[
        "-h",
        "127.0.0.1",
        "--config",
        config.to_str().unwrap(),
        "--json",
    ]);

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(json["status"], "UNKNOWN");
    assert_eq!(json["perfdata"], serde_json::json!([]));
}

#[test]
fn test_missing_host_is_unknown() {
    let output = check_snmp_mem(&["-w", "80%"]);

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stdout(&output), "UNKNOWN: Argument error: No host specified (use -h/--host)\n");
}

#[test]
fn test_argument_errors_are_single_line_unknown() {
    let cases: [&[&str]; 3] = [
        &["-h", "db01", "-w", "lots"],
        &["-h", "db01", "--bogus"],
        &["-h", "db01", "-t", "0"],
    ];
    for args in cases {
        let output = check_snmp_mem(args);
        let text = stdout(&output);

        assert_eq!(output.status.code(), Some(3), "{:?}", args);
        assert!(text.starts_with("UNKNOWN: "), "{:?}: {}", args, text);
        assert_eq!(text.lines().count(), 1, "{:?}: {}", args, text);
    }
}

#[test]
fn test_help_exits_unknown() {
    let output = check_snmp_mem(&["--help"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(stdout(&output).contains("--host"));
}

#[test]
fn test_version_exits_unknown() {
    let output = check_snmp_mem(&["--version"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

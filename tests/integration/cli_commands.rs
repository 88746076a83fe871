#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn isolated(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("swaparena");
    cmd.env("SWAPARENA_CONFIG", dir.join("absent.toml"))
        .env_remove("RUST_LOG")
        .arg("--theme")
        .arg("plain");
    cmd
}

#[test]
fn info_reports_resolved_plan() {
    let dir = TempDir::new().expect("tempdir");
    let output = isolated(dir.path())
        .args(["info", "--page-shift", "12", "--budget-pages", "8"])
        .args(["--memory-ceiling", "1048576"])
        .assert()
        .success()
        .get_output()
        .clone();
    let text = stdout_of(&output);
    assert!(text.contains("page size: 4096 bytes"), "{text}");
    assert!(text.contains("resident budget: 8 pages"), "{text}");
    assert!(text.contains("memory ceiling: 1048576 bytes"), "{text}");
}

#[test]
fn config_file_sits_under_flags() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        "[paging]\npage_shift = 10\nresident_page_budget = 5\nbatch_size = 2\n",
    )
    .unwrap();
    let output = cargo_bin_cmd!("swaparena")
        .arg("--config")
        .arg(&config)
        .args(["info", "--budget-pages", "7"])
        .assert()
        .success()
        .get_output()
        .clone();
    let text = stdout_of(&output);
    assert!(text.contains("page size: 1024 bytes"), "{text}");
    assert!(text.contains("resident budget: 7 pages"), "{text}");
    assert!(text.contains("batch size: 2"), "{text}");
}

#[test]
fn malformed_config_fails() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "[paging]\npage_shift = \"big\"\n").unwrap();
    cargo_bin_cmd!("swaparena")
        .arg("--config")
        .arg(&config)
        .arg("info")
        .assert()
        .failure();
}

#[test]
fn invalid_page_shift_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    isolated(dir.path())
        .args(["info", "--page-shift", "30"])
        .assert()
        .failure();
}

#[test]
fn stress_verifies_records_under_a_tiny_budget() {
    let dir = TempDir::new().expect("tempdir");
    let output = isolated(dir.path())
        .args(["stress", "--records", "800", "--seed", "7"])
        .args(["--page-shift", "8", "--budget-pages", "4"])
        .arg("--swap-dir")
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .clone();
    let text = stdout_of(&output);
    assert!(text.contains("verified 800 records"), "{text}");
    assert!(text.contains("evictions"), "{text}");
}

#[test]
fn strings_reports_dedup_statistics() {
    let dir = TempDir::new().expect("tempdir");
    let output = isolated(dir.path())
        .args(["strings", "--dedup", "--threshold-percent", "0"])
        .write_stdin("shared line\nshared line\nok\nunique entry\n")
        .assert()
        .success()
        .get_output()
        .clone();
    let text = stdout_of(&output);
    assert!(text.contains("lines: 4"), "{text}");
    assert!(text.contains("distinct handles: 3"), "{text}");
    assert!(text.contains("hash efficiency=["), "{text}");
}

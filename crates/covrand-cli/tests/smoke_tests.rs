//! Smoke tests for the covrand CLI
//!
//! Inputs are written as literal documents, the way a previous run would
//! have exported them.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a command for the covrand binary
fn covrand() -> Command {
    Command::cargo_bin("covrand").expect("covrand binary should exist")
}

/// `top.alu.op` with `add` hit once and `sub` not at all
const RUN_A_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<top abs_name="top" kind="group" size="2" coverage="1" cover_percentage="50.00">
  <alu abs_name="top.alu" kind="group" size="2" coverage="1" cover_percentage="50.00">
    <op abs_name="top.alu.op" kind="point" size="2" coverage="1" cover_percentage="50.00" weight="1" at_least="1">
      <bin bin="add" hits="1"/>
      <bin bin="sub" hits="0"/>
    </op>
  </alu>
</top>
"#;

/// `top.alu.op` with `sub` hit three times, plus a cover check
const RUN_B_YAML: &str = "\
top:
  kind: group
  size: 3
  coverage: 2
top.alu:
  kind: group
  size: 3
  coverage: 2
top.alu.op:
  kind: point
  size: 2
  coverage: 1
  weight: 1
  at_least: 1
  bins:
  - bin: add
    hits: 0
  - bin: sub
    hits: 3
top.alu.no_overflow:
  kind: check
  size: 1
  coverage: 1
  weight: 1
  at_least: 1
  bins:
  - bin: PASS
    hits: 4
  - bin: FAIL
    hits: 0
";

fn write_inputs(dir: &TempDir) -> (PathBuf, PathBuf) {
    let a = dir.path().join("run_a.xml");
    let b = dir.path().join("run_b.yml");
    fs::write(&a, RUN_A_XML).unwrap();
    fs::write(&b, RUN_B_YAML).unwrap();
    (a, b)
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    covrand()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    covrand()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn test_no_args_fails() {
    covrand().assert().failure();
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_merge_xml_and_yaml() {
    let dir = TempDir::new().unwrap();
    let (a, b) = write_inputs(&dir);
    let out = dir.path().join("merged.yml");

    covrand()
        .arg("merge")
        .arg("-o")
        .arg(&out)
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 2 files"))
        .stdout(predicate::str::contains("top: coverage=3, size=3, cover_percentage=100.00"));

    let merged = fs::read_to_string(&out).unwrap();
    assert!(merged.contains("top.alu.no_overflow"));
}

#[test]
fn test_merge_quiet_prints_nothing() {
    let dir = TempDir::new().unwrap();
    let (a, b) = write_inputs(&dir);
    let out = dir.path().join("merged.xml");

    covrand()
        .args(["-q", "merge", "-o"])
        .arg(&out)
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert!(fs::read_to_string(&out).unwrap().starts_with("<?xml"));
}

#[test]
fn test_merge_single_input_rejected() {
    let dir = TempDir::new().unwrap();
    let (a, _) = write_inputs(&dir);
    covrand()
        .args(["merge", "-o"])
        .arg(dir.path().join("out.yml"))
        .arg(&a)
        .assert()
        .failure();
}

#[test]
fn test_merge_garbage_input() {
    let dir = TempDir::new().unwrap();
    let (a, _) = write_inputs(&dir);
    let junk = dir.path().join("junk.txt");
    fs::write(&junk, "this is not coverage").unwrap();

    covrand()
        .args(["merge", "-o"])
        .arg(dir.path().join("out.yml"))
        .arg(&a)
        .arg(&junk)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Unsupported coverage document"));
}

// ============================================================================
// Report
// ============================================================================

#[test]
fn test_report_with_bins() {
    let dir = TempDir::new().unwrap();
    let (a, _) = write_inputs(&dir);

    covrand()
        .arg("report")
        .arg(&a)
        .arg("--bins")
        .assert()
        .success()
        .stdout(predicate::str::contains("top : group, coverage=1, size=2"))
        .stdout(predicate::str::contains(
            "      top.alu.op : point, coverage=1, size=2, cover_percentage=50.00",
        ))
        .stdout(predicate::str::contains("BIN add : 1"));
}

#[test]
fn test_report_node_prefix() {
    let dir = TempDir::new().unwrap();
    let (_, b) = write_inputs(&dir);

    covrand()
        .arg("report")
        .arg(&b)
        .args(["--node", "top.alu.no"])
        .assert()
        .success()
        .stdout(predicate::str::contains("top.alu.no_overflow : check"))
        .stdout(predicate::str::contains("top.alu.op").not());
}

#[test]
fn test_report_unknown_node() {
    let dir = TempDir::new().unwrap();
    let (a, _) = write_inputs(&dir);

    covrand()
        .arg("report")
        .arg(&a)
        .args(["--node", "top.fpu"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid argument"));
}

#[test]
fn test_report_missing_file() {
    covrand()
        .args(["report", "/nonexistent/coverage.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

//! End-to-end CLI tests.
//!
//! Every invocation points `PIIGUARD_STORAGE__DATA_DIR` at a temp
//! directory so the database, key file, and audit log never touch the
//! real per-user locations.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn piiguard(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("piiguard").unwrap();
    cmd.env("PIIGUARD_STORAGE__DATA_DIR", data_dir.path());
    cmd
}

fn docs_with_ssn() -> TempDir {
    let docs = TempDir::new().unwrap();
    fs::write(
        docs.path().join("hr.txt"),
        "Employee record. SSN: 078-05-1120. Contact alice@example.org.",
    )
    .unwrap();
    fs::write(docs.path().join("notes.md"), "Nothing sensitive here.").unwrap();
    docs
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("piiguard")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("findings"))
        .stdout(predicate::str::contains("audit"));
}

#[test]
fn version_prints() {
    Command::cargo_bin("piiguard")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("piiguard")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}

#[test]
fn scan_json_output_is_redacted() {
    let data = TempDir::new().unwrap();
    let docs = docs_with_ssn();

    let assert = piiguard(&data)
        .args(["scan", "--format", "json", "--no-store"])
        .arg(docs.path())
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("stdout is valid JSON");

    assert_eq!(report["summary"]["total_files"], 2);
    assert_eq!(report["summary"]["files_with_matches"], 1);
    assert!(!stdout.contains("078-05-1120"));
    assert!(stdout.contains("07*******20"));
}

#[test]
fn scan_store_then_query_findings() {
    let data = TempDir::new().unwrap();
    let docs = docs_with_ssn();

    piiguard(&data)
        .arg("scan")
        .arg(docs.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored scan"));

    // Redacted by default.
    piiguard(&data)
        .args(["findings", "--entity-type", "ssn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("07*******20"))
        .stdout(predicate::str::contains("078-05-1120").not());

    // Decryption is explicit.
    piiguard(&data)
        .args(["findings", "--entity-type", "ssn", "--decrypt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("078-05-1120"));
}

#[test]
fn stored_scans_are_listed_and_deletable() {
    let data = TempDir::new().unwrap();
    let docs = docs_with_ssn();

    piiguard(&data).arg("scan").arg(docs.path()).assert().success();

    let assert = piiguard(&data)
        .args(["scans", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("files"));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let scan_id = stdout
        .lines()
        .find_map(|l| l.split_whitespace().next().filter(|id| id.len() == 8))
        .expect("a scan id in the listing")
        .to_string();

    // Deletion requires confirmation.
    piiguard(&data)
        .args(["scans", "delete", &scan_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    piiguard(&data)
        .args(["scans", "delete", &scan_id, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted scan"));
}

#[test]
fn audit_log_records_the_lifecycle() {
    let data = TempDir::new().unwrap();
    let docs = docs_with_ssn();

    piiguard(&data).arg("scan").arg(docs.path()).assert().success();
    piiguard(&data).arg("findings").assert().success();

    piiguard(&data)
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan_complete"))
        .stdout(predicate::str::contains("finding_store"))
        .stdout(predicate::str::contains("finding_read"));

    piiguard(&data)
        .args(["audit", "--stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries:"));
}

#[test]
fn key_status_and_rotation() {
    let data = TempDir::new().unwrap();
    let docs = docs_with_ssn();

    piiguard(&data)
        .args(["key", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    piiguard(&data).arg("scan").arg(docs.path()).assert().success();

    piiguard(&data)
        .args(["key", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("present"));

    piiguard(&data)
        .args(["key", "rotate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rotated"));

    // Old ciphertext is unreadable under the new key; redacted listings
    // still work because they never touch the encrypted columns.
    piiguard(&data)
        .arg("findings")
        .assert()
        .success()
        .stdout(predicate::str::contains("07*******20"));
    piiguard(&data)
        .args(["findings", "--decrypt"])
        .assert()
        .failure();
}

#[test]
fn export_writes_a_redacted_report() {
    let data = TempDir::new().unwrap();
    let docs = docs_with_ssn();

    piiguard(&data).arg("scan").arg(docs.path()).assert().success();

    let assert = piiguard(&data).args(["scans", "list"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let scan_id = stdout
        .lines()
        .find_map(|l| l.split_whitespace().next().filter(|id| id.len() == 8))
        .unwrap()
        .to_string();

    let report_path = data.path().join("report.json");
    piiguard(&data)
        .args(["export", &scan_id, "--output"])
        .arg(&report_path)
        .assert()
        .success();

    let report = fs::read_to_string(&report_path).unwrap();
    assert!(report.contains(&scan_id));
    assert!(!report.contains("078-05-1120"));
    assert!(report.contains("07*******20"));
}

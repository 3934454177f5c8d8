//! Command-line behaviour of the `ledgr` binary.

use std::fs;

use assert_cmd::Command;
use chrono::{Duration, Local};
use predicates::prelude::*;
use tempfile::TempDir;

const INVOICE_TEXT: &str = "TAX INVOICE
Sold By: Sharma Traders Pvt Ltd
GSTIN: 27AABCU9603R1ZN
Invoice No: INV-2024-001
Invoice Date: {date}

Bill To: Kulkarni Enterprises
GSTIN: 27AAPFU0939F1ZV
Place of Supply: 27-Maharashtra

Sub Total: 10,000.00
CGST @ 9%: 900.00
SGST @ 9%: 900.00
Grand Total: 11,800.00
";

/// The invoice text dated last week, inside the accepted invoice age.
fn invoice_text() -> String {
    let date = (Local::now() - Duration::days(7)).format("%d/%m/%Y").to_string();
    INVOICE_TEXT.replace("{date}", &date)
}

fn ledgr() -> Command {
    let mut cmd = Command::cargo_bin("ledgr").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn gstin_reports_state_and_pan() {
    ledgr()
        .args(["gstin", "27AABCU9603R1ZN", "29AAGCR4375J1ZU"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Maharashtra"))
        .stdout(predicate::str::contains("Karnataka"))
        .stdout(predicate::str::contains("PAN AABCU9603R"));
}

#[test]
fn gstin_fails_on_bad_check_character() {
    ledgr()
        .args(["gstin", "27AABCU9603R1ZN", "27AABCU9603R1ZM"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("check character is M but should be N"))
        .stderr(predicate::str::contains("1 of 2 GSTINs are invalid"));
}

#[test]
fn validate_text_invoice_as_json() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("invoice.txt");
    fs::write(&input, invoice_text()).unwrap();

    ledgr()
        .arg("validate")
        .arg(&input)
        .args(["--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"invoice\""))
        .stdout(predicate::str::contains("\"gstin_checksum\""))
        .stdout(predicate::str::contains("\"should_auto_approve\": true"));
}

#[test]
fn validate_text_flags_bad_gstin() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("invoice.txt");
    fs::write(&input, invoice_text().replace("R1ZN", "R1ZM")).unwrap();

    ledgr()
        .arg("validate")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("needs review"))
        .stdout(predicate::str::contains("27AABCU9603R1ZM"));
}

#[test]
fn config_init_then_get() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    ledgr()
        .args(["config", "init", "--output"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    ledgr()
        .arg("-c")
        .arg(&path)
        .args(["config", "get", "scoring.auto_approve_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.85"));

    ledgr()
        .args(["config", "init", "--output"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn config_set_refuses_inverted_thresholds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    ledgr()
        .arg("-c")
        .arg(&path)
        .args(["config", "set", "scoring.needs_review_threshold", "0.99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("thresholds"));
    assert!(!path.exists());

    ledgr()
        .arg("-c")
        .arg(&path)
        .args(["config", "set", "duplicates.fuzzy_threshold", "0.85"])
        .assert()
        .success();
    let saved = fs::read_to_string(&path).unwrap();
    assert!(saved.contains("\"fuzzy_threshold\": 0.85"));
}

#[test]
fn process_missing_file_fails() {
    ledgr()
        .args(["process", "/nonexistent/invoice.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

//! End-to-end tests for the `tally` binary.
//!
//! Each test runs the binary as a subprocess against its own temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

/// Build a Command targeting the tally binary, with data under `dir`.
fn tally(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.env("TALLY_DATA_DIR", dir);
    cmd.env("RUST_LOG", "error");
    cmd
}

/// Export and parse the whole data set.
fn export(dir: &Path) -> Value {
    let output = tally(dir).arg("export").output().unwrap();
    assert!(
        output.status.success(),
        "export failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_no_command_prints_hint() {
    let temp_dir = TempDir::new().unwrap();
    tally(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("tally --help"));
}

#[test]
fn test_budget_and_expense_flow() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    tally(dir)
        .args(["budget", "save", "Food", "300", "--month", "2025-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved budget 'Food' for 2025-01"));

    tally(dir)
        .args(["expense", "add", "12.5", "Lunch", "--budget", "Food", "--date", "2025-01-10"])
        .assert()
        .success();

    // Same description, no budget: inherits Food
    tally(dir)
        .args(["expense", "add", "9", "Lunch", "--date", "2025-01-11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("in Food"));

    let data = export(dir);
    assert_eq!(data["budgets"].as_array().unwrap().len(), 1);
    assert_eq!(data["expenses"].as_array().unwrap().len(), 2);
    assert!(data["budgets"][0].get("_rev").is_none());

    tally(dir)
        .args(["month", "2025-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Food"))
        .stdout(predicate::str::contains("$21.50"));
}

#[test]
fn test_validation_errors_fail() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    tally(dir)
        .args(["budget", "save", "Total", "10", "--month", "2025-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot create budget named \"Total\"."));

    tally(dir)
        .args(["budget", "save", "Food", "10", "--month", "2025-01"])
        .assert()
        .success();
    tally(dir)
        .args(["budget", "save", "Food", "20", "--month", "2025-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_month_too_far_ahead() {
    let temp_dir = TempDir::new().unwrap();
    tally(temp_dir.path())
        .args(["month", "2999-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot travel further into the future!"));
}

#[test]
fn test_delete_budget_with_expenses_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    tally(dir)
        .args(["expense", "add", "5", "Bus", "--budget", "Transit", "--date", "2025-02-03"])
        .assert()
        .success();

    let data = export(dir);
    let budget_id = data["budgets"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(data["budgets"][0]["name"], "Transit");
    assert_eq!(data["budgets"][0]["value"], 100.0);

    tally(dir)
        .args(["budget", "delete", &budget_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("You can't delete a budget with expenses."));
}

#[test]
fn test_export_import_replace_round_trip() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();

    tally(source.path())
        .args(["expense", "add", "40", "Groceries", "--budget", "Food", "--date", "2025-03-02"])
        .assert()
        .success();
    let file = source.path().join("export.json");
    tally(source.path())
        .args(["export", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 budgets and 1 expenses"));

    tally(target.path())
        .args(["budget", "save", "Old", "1", "--month", "2025-03"])
        .assert()
        .success();
    tally(target.path())
        .args(["import", file.to_str().unwrap(), "--replace"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 budgets and 1 expenses"));

    let data = export(target.path());
    assert_eq!(data, export(source.path()));
}

#[test]
fn test_import_rejects_garbage() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("garbage.json");
    std::fs::write(&file, "{\"accounts\": []}").unwrap();

    tally(temp_dir.path())
        .args(["import", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Could not parse the file. Please confirm what you chose is correct.",
        ));
}

#[test]
fn test_settings_commands() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    tally(dir)
        .args(["currency", "eur"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Currency set to EUR"));
    tally(dir)
        .arg("currency")
        .assert()
        .success()
        .stdout(predicate::str::contains("EUR"));

    tally(dir)
        .args(["sync", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local only"));
}

#[test]
fn test_sync_run_pushes_to_remote() {
    let device = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let dir = device.path();

    tally(dir)
        .args(["budget", "save", "Food", "300", "--month", "2025-01"])
        .assert()
        .success();
    tally(dir)
        .args(["sync", "token", remote.path().to_str().unwrap()])
        .assert()
        .success();
    tally(dir)
        .args(["sync", "run", "--timeout", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("First sync:     budgets yes, expenses yes"));

    // A second device picks the budget up from the remote
    let other = TempDir::new().unwrap();
    tally(other.path())
        .args(["sync", "token", remote.path().to_str().unwrap()])
        .assert()
        .success();
    tally(other.path())
        .args(["sync", "run", "--timeout", "10"])
        .assert()
        .success();
    assert_eq!(export(other.path())["budgets"][0]["name"], "Food");
}

#[test]
fn test_reset_needs_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    tally(dir)
        .args(["budget", "save", "Food", "300", "--month", "2025-01"])
        .assert()
        .success();

    tally(dir)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
    assert_eq!(export(dir)["budgets"].as_array().unwrap().len(), 1);

    tally(dir).args(["reset", "--yes"]).assert().success();
    assert!(export(dir)["budgets"].as_array().unwrap().is_empty());
}

#[test]
fn test_month_filters_expenses() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    for (cost, description, budget) in [("4", "Coffee", "Treats"), ("30", "Groceries", "Food")] {
        tally(dir)
            .args(["expense", "add", cost, description, "--budget", budget, "--date", "2025-01-10"])
            .assert()
            .success();
    }

    tally(dir)
        .args(["month", "2025-01", "--search", "coff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Showing 1 of 2 expenses"))
        .stdout(predicate::str::contains("Coffee"));

    tally(dir)
        .args(["month", "2025-01", "--budget", "Food"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Showing 1 of 2 expenses"));
}

use assert_cmd::Command;
use std::fs;

fn cmd() -> Command {
    Command::cargo_bin("procmap").expect("binary builds")
}

#[test]
fn analyze_file_prints_json_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("get_orders.sql");
    fs::write(
        &input,
        "CREATE PROCEDURE GetOrders @CustomerID INT AS SELECT OrderID FROM Orders WHERE CustomerID = @CustomerID",
    )
    .unwrap();

    let assert = cmd().arg("analyze").arg(&input).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["metadata"]["procedureName"], "GetOrders");
    assert!(report["repositoryBoundaries"].is_array());
}

#[test]
fn analyze_directory_writes_reports() {
    let dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.sql"), "SELECT 1 FROM Orders").unwrap();
    fs::write(dir.path().join("b.sql"), "DELETE FROM Sessions").unwrap();

    cmd()
        .arg("analyze")
        .arg(dir.path())
        .arg("--output")
        .arg(out.path())
        .arg("--no-parallel")
        .assert()
        .success();

    assert!(out.path().join("a.json").exists());
    assert!(out.path().join("b.json").exists());
}

#[test]
fn basic_flag_empties_advisory_sections() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("proc.sql");
    fs::write(&input, "EXEC(@dynamicSql)").unwrap();

    let assert = cmd()
        .arg("analyze")
        .arg(&input)
        .arg("--basic")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["implementationComplexity"].as_array().unwrap().len(), 0);
}

#[test]
fn missing_input_fails() {
    cmd()
        .arg("analyze")
        .arg("/nonexistent/path.sql")
        .assert()
        .failure();
}

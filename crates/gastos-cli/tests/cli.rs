use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn gastos() -> Command {
    Command::cargo_bin("gastos").unwrap()
}

#[test]
fn test_help_lists_commands() {
    gastos()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("ingest"));
}

#[test]
fn test_config_init_and_show() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    gastos()
        .args(["config", "init", "--output"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    gastos()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gpt-4o-mini"))
        .stdout(predicate::str::contains("\"min_text_length\": 30"));

    gastos()
        .args(["config", "init", "--output"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_config_get() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"llm": {"model": "llama3.1"}}"#).unwrap();

    gastos()
        .arg("--config")
        .arg(&path)
        .args(["config", "get", "llm.model"])
        .assert()
        .success()
        .stdout(predicate::str::contains("llama3.1"));

    gastos()
        .arg("--config")
        .arg(&path)
        .args(["config", "get", "llm.nope"])
        .assert()
        .failure();
}

#[test]
fn test_process_rejects_unsupported_format() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("animacion.gif");
    std::fs::write(&input, b"GIF89a").unwrap();

    gastos()
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file format"));
}

#[test]
fn test_process_missing_file() {
    gastos()
        .args(["process", "does-not-exist.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_ingest_without_matches() {
    let dir = tempdir().unwrap();
    let pattern = dir.path().join("*.pdf");

    gastos()
        .arg("ingest")
        .arg(pattern.to_string_lossy().as_ref())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

mod common;

use assert_cmd::Command;
use common::fixtures::load_fixture;
use common::wiremock_helpers::mock_crtsh_page;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn subsweep() -> Command {
    let mut cmd = Command::cargo_bin("subsweep").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, crtsh_url: &str, format: &str) -> std::path::PathBuf {
    let config = format!(
        r#"
[output]
directory = '{out}'
format = "{format}"

[sources.subfinder]
enabled = false

[sources.crtsh]
base_url = "{crtsh}"
timeout_secs = 5
"#,
        out = dir.join("out").display(),
        format = format,
        crtsh = crtsh_url
    );
    let path = dir.join("subsweep.toml");
    std::fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_init_writes_default_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config").join("subsweep.toml");

    subsweep()
        .arg("--init")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created default configuration file"));

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[sources.crtsh]"));
    assert!(content.contains("[sources.zoomeye]"));
}

#[test]
fn test_missing_config_points_to_init() {
    let tmp = TempDir::new().unwrap();
    subsweep()
        .args(["-t", "example.com", "--config"])
        .arg(tmp.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"))
        .stderr(predicate::str::contains("--init"));
}

#[test]
fn test_target_is_required() {
    subsweep()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Target is required"));
}

#[test]
fn test_unknown_source_is_rejected() {
    subsweep()
        .args(["-t", "example.com", "--sources", "virustotal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown source"));
}

#[test]
fn test_invalid_target_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "http://127.0.0.1:9", "csv");

    subsweep()
        .args(["-t", "not a domain", "--no-progress", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid domain"));
    assert!(!tmp.path().join("out").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_writes_json_results() {
    let tmp = TempDir::new().unwrap();
    let server = mock_crtsh_page("example.com", &load_fixture("crtsh_example.html")).await;
    let config = write_config(tmp.path(), &server.uri(), "json");

    let mut cmd = subsweep();
    cmd.args(["-t", "example.com", "--no-progress", "--config"]).arg(&config);
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("Total unique subdomains: 2"))
            .stdout(predicate::str::contains("Results saved to"));
    })
    .await
    .unwrap();

    let written: Vec<_> = std::fs::read_dir(tmp.path().join("out"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(written.len(), 1);
    let file_name = written[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("subdomains_example.com_"), "{}", file_name);
    assert!(file_name.ends_with(".json"));

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
    assert_eq!(value["combined"], serde_json::json!(["b.example.com", "c.example.com"]));
    assert_eq!(value["sources"]["crtsh"], serde_json::json!(["b.example.com", "c.example.com"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_run_persists_nothing() {
    let tmp = TempDir::new().unwrap();
    let server = mock_crtsh_page("example.com", "<html><body>No certificates</body></html>").await;
    let config = write_config(tmp.path(), &server.uri(), "csv");

    let mut cmd = subsweep();
    cmd.args(["-t", "example.com", "--no-progress", "--config"]).arg(&config);
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("No subdomains found"));
    })
    .await
    .unwrap();

    assert!(!tmp.path().join("out").exists());
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Command-line integration tests against the pipelines in `demos/`

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use pipewright::CompiledArtifact;

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

fn pipewright() -> Command {
    let mut cmd = Command::cargo_bin("pipewright").unwrap();
    cmd.env_remove("PIPEWRIGHT_CONFIG").env("NO_COLOR", "1");
    cmd
}

/// Config rooted in a temporary directory, so runs never write into the repo
fn temp_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("pipewright.toml");
    let content = format!(
        r#"
[image]
name = "local"
tag = "test"

[volume]
root = "{}"

[driver]
poll_interval_ms = 20
max_poll_interval_ms = 100
timeout_secs = 60
"#,
        dir.path().join("volume").display()
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_validate_demo_pipeline() {
    pipewright()
        .arg("validate")
        .arg(demo("processing.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn test_validate_reports_forward_reference() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(
        &path,
        "name: bad\nsteps:\n  - id: b\n    executable: b.sh\n    after: [a]\n  - id: a\n    executable: a.sh\n",
    )
    .unwrap();

    pipewright()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("depends on unknown step 'a'"));
}

#[test]
fn test_validate_missing_file() {
    pipewright()
        .args(["validate", "does-not-exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pipeline file not found"));
}

#[test]
fn test_graph_mermaid_shows_fan_out() {
    pipewright()
        .arg("graph")
        .arg(demo("processing.yaml"))
        .args(["--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph TD"))
        .stdout(predicate::str::contains("download --> process1"))
        .stdout(predicate::str::contains("download --> process10"));
}

#[test]
fn test_graph_text_has_no_trailing_blank_line() {
    pipewright()
        .arg("graph")
        .arg(demo("processing.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::ends_with("\n"))
        .stdout(predicate::str::ends_with("\n\n").not());
}

#[test]
fn test_compile_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let config = demo("pipewright.toml");
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    for out in [&first, &second] {
        pipewright()
            .arg("--config")
            .arg(&config)
            .arg("compile")
            .arg(demo("processing.yaml"))
            .arg("-o")
            .arg(out)
            .assert()
            .success();
    }

    let bytes = std::fs::read(&first).unwrap();
    assert_eq!(bytes, std::fs::read(&second).unwrap());

    let artifact = CompiledArtifact::from_file(&first).unwrap();
    assert_eq!(artifact.tasks.len(), 11);
    assert_eq!(artifact.tasks[0].id, "download");
    assert_eq!(
        artifact.tasks[0].image,
        "registry.example.com/ml/dataset-processing:v1"
    );
    assert!(artifact.tasks[1..]
        .iter()
        .all(|t| t.dependencies == vec!["download".to_string()]));
}

#[test]
fn test_compile_without_image_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("empty.toml");
    std::fs::write(&config, "").unwrap();

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("compile")
        .arg(demo("processing.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("implicit image"));
}

#[test]
fn test_run_fans_out_on_local_engine() {
    let dir = TempDir::new().unwrap();
    let config = temp_config(&dir);

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(demo("processing.yaml"))
        .args(["--param", "import-from=https://example.org/data.zip"])
        .assert()
        .success();

    let volume = dir.path().join("volume");
    let raw = std::fs::read_to_string(volume.join("raw/data.txt")).unwrap();
    assert_eq!(raw.trim(), "https://example.org/data.zip");
    for i in 1..=10 {
        assert!(volume.join(format!("processed/{}.txt", i)).exists());
    }
}

#[test]
fn test_run_compiled_artifact() {
    let dir = TempDir::new().unwrap();
    let config = temp_config(&dir);
    let artifact = dir.path().join("artifact.json");

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("compile")
        .arg(demo("processing.yaml"))
        .arg("-o")
        .arg(&artifact)
        .assert()
        .success();

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&artifact)
        .args(["-p", "import-from=file:///data.zip", "-p", "dataset-file=in/other.txt"])
        .assert()
        .success();

    assert!(dir.path().join("volume/in/other.txt").exists());
}

#[test]
fn test_run_missing_parameter() {
    let dir = TempDir::new().unwrap();
    let config = temp_config(&dir);

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(demo("processing.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("import-from"));

    assert!(!dir.path().join("volume/raw").exists());
}

#[test]
fn test_run_after_build() {
    let dir = TempDir::new().unwrap();
    let config = temp_config(&dir);

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(demo("processing.yaml"))
        .arg("--build")
        .arg(demo("build-image.yaml"))
        .arg("--no-stage")
        .args(["--param", "import-from=https://example.org/data.zip"])
        .assert()
        .success();

    let log = std::fs::read_to_string(dir.path().join("volume/build.log")).unwrap();
    assert!(log.contains("built local:test"));
    assert!(dir.path().join("volume/processed/10.txt").exists());
}

#[test]
fn test_failed_build_skips_pipeline() {
    let dir = TempDir::new().unwrap();
    let config = temp_config(&dir);
    let build = dir.path().join("failing-build.yaml");
    std::fs::write(
        &build,
        "name: failing-build\nsteps:\n  - id: build\n    executable: sh\n    args: [\"-c\", \"echo no registry >&2; exit 1\"]\n",
    )
    .unwrap();

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(demo("processing.yaml"))
        .arg("--build")
        .arg(&build)
        .args(["--param", "import-from=https://example.org/data.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did not succeed"));

    assert!(!dir.path().join("volume/raw").exists());
}

#[test]
fn test_verbose_run_logs_step_output() {
    let dir = TempDir::new().unwrap();
    let config = temp_config(&dir);
    let pipeline = dir.path().join("greet.yaml");
    std::fs::write(
        &pipeline,
        "name: greet\nsteps:\n  - id: hello\n    executable: sh\n    args: [\"-c\", \"echo hello-from-step\"]\n",
    )
    .unwrap();

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("-v")
        .arg("run")
        .arg(&pipeline)
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("hello-from-step"));
}

#[test]
fn test_timed_out_local_run_stops_with_process() {
    let dir = TempDir::new().unwrap();
    let config = temp_config(&dir);
    let pipeline = dir.path().join("slow.yaml");
    std::fs::write(
        &pipeline,
        "name: slow\nsteps:\n  - id: a\n    executable: sleep\n    args: [\"2\"]\n  - id: b\n    executable: touch\n    args: [b.done]\n    after: [a]\n",
    )
    .unwrap();

    pipewright()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&pipeline)
        .args(["--timeout", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("timed out"))
        .stderr(predicate::str::contains("stops when pipewright exits"))
        .stderr(predicate::str::contains("still executing").not());

    // Step a would have finished by now had the run outlived the command
    std::thread::sleep(std::time::Duration::from_secs(2));
    assert!(!dir.path().join("volume/b.done").exists());
}

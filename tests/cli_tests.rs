mod common;

use assert_cmd::prelude::*;
use common::{FakeSteps, create_invalid_toml, matrix_toml, setup_test_project, write_matrix};
use predicates::prelude::*;
use std::process::Command;

fn wheel_matrix() -> Command {
    Command::cargo_bin("wheel-matrix").unwrap()
}

/// A full run on this host builds, uploads and reports success.
///
/// 在本宿主机上的完整运行会构建、上传并报告成功。
#[cfg(unix)]
#[test]
fn test_successful_run() {
    let project = setup_test_project();
    let config = write_matrix(
        project.path(),
        &matrix_toml(&["3.11", "3.12"], &FakeSteps::default(), "", ""),
    );

    wheel_matrix()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--project-dir")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("All build jobs passed!"))
        .stdout(predicate::str::contains("Packaging crate"));

    let os = common::host_os();
    assert!(project.path().join(format!("artifacts/wheels-{os}-3.11.zip")).exists());
    assert!(project.path().join(format!("artifacts/wheels-{os}-3.11.json")).exists());
}

/// One failing pair makes the run exit non-zero while the other still uploads.
///
/// 一个失败的组合会使运行以非零状态退出，而其他组合仍然会上传。
#[cfg(unix)]
#[test]
fn test_partial_failure() {
    let project = setup_test_project();
    let steps = FakeSteps {
        build: "sh -c 'test {runtime_version} != 3.9 && mkdir -p dist && touch dist/pkg-{runtime_version}.whl'"
            .to_string(),
        ..FakeSteps::default()
    };
    let config = write_matrix(project.path(), &matrix_toml(&["3.9", "3.11"], &steps, "", ""));

    wheel_matrix()
        .args(["run", "--config"])
        .arg(&config)
        .arg("--project-dir")
        .arg(project.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("--- Failed Jobs ---"))
        .stdout(predicate::str::contains("Build failure at step 'Build'"))
        .stderr(predicate::str::contains("1 of 2 build jobs failed"));

    let os = common::host_os();
    assert!(project.path().join(format!("artifacts/wheels-{os}-3.11.zip")).exists());
    assert!(!project.path().join(format!("artifacts/wheels-{os}-3.9.zip")).exists());
}

/// An event missing from `triggers` runs nothing.
#[test]
fn test_event_not_triggered() {
    let project = setup_test_project();
    let config = write_matrix(
        project.path(),
        &matrix_toml(&["3.11"], &FakeSteps::default(), "", "triggers = [\"push\"]"),
    );

    wheel_matrix()
        .args(["run", "--event", "pull_request", "--config"])
        .arg(&config)
        .arg("--project-dir")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is not listed in the workflow triggers"));

    assert!(!project.path().join("artifacts").exists());
}

#[test]
fn test_plan_json_lists_every_pair() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_matrix(
        dir.path(),
        r#"
[[matrix]]
os = "windows"
runtime_versions = ["3.11", "3.12"]

[[matrix]]
os = "macos"
runtime_versions = ["3.9", "3.11", "3.12"]
"#,
    );

    let output = wheel_matrix()
        .args(["plan", "--json", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let jobs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = jobs
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["artifact_name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "wheels-windows-3.11",
            "wheels-windows-3.12",
            "wheels-macos-3.9",
            "wheels-macos-3.11",
            "wheels-macos-3.12"
        ]
    );
}

/// A template that maps two pairs to one name is rejected before any job runs.
#[test]
fn test_artifact_name_collision_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_matrix(
        dir.path(),
        r#"
artifact_name = "wheels-{os}"

[[matrix]]
os = "macos"
runtime_versions = ["3.11", "3.12"]
"#,
    );

    wheel_matrix()
        .args(["plan", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("wheels-macos"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_invalid_toml(dir.path());

    wheel_matrix()
        .args(["plan", "--lang", "en", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse build matrix configuration"));
}

#[test]
fn test_init_non_interactive_writes_default_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("BuildMatrix.toml");

    wheel_matrix()
        .args(["init", "--non-interactive", "--lang", "en", "--output"])
        .arg(&output)
        .assert()
        .success();

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.starts_with('#'));
    assert!(content.contains("maturin"));

    wheel_matrix()
        .args(["plan", "--config"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("wheels-macos-3.9"));
}

#[test]
fn test_chinese_help() {
    wheel_matrix()
        .args(["--lang", "zh-CN", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wheel 矩阵"));
}

/// Runner 2 of 2 builds every second host job, starting from the second.
///
/// 2 个运行器中的第 2 个构建本宿主机作业中从第二个开始的每隔一个作业。
#[cfg(unix)]
#[test]
fn test_split_runner_builds_its_share() {
    let project = setup_test_project();
    let config = write_matrix(
        project.path(),
        &matrix_toml(&["3.9", "3.11", "3.12"], &FakeSteps::default(), "", ""),
    );

    wheel_matrix()
        .args(["run", "--total-runners", "2", "--runner-index", "1", "--config"])
        .arg(&config)
        .arg("--project-dir")
        .arg(project.path())
        .assert()
        .success();

    let os = common::host_os();
    let store = project.path().join("artifacts");
    assert!(store.join(format!("wheels-{os}-3.11.zip")).exists());
    assert!(!store.join(format!("wheels-{os}-3.9.zip")).exists());
    assert!(!store.join(format!("wheels-{os}-3.12.zip")).exists());
}

/// Jobs for other operating systems are counted against the whole matrix.
#[cfg(unix)]
#[test]
fn test_filtered_jobs_are_reported_against_the_matrix_total() {
    let project = setup_test_project();
    let other_os = if common::host_os() == "windows" { "macos" } else { "windows" };
    let other_entry = format!("[[matrix]]\nos = \"{other_os}\"\nruntime_versions = [\"3.11\", \"3.12\"]");
    let config = write_matrix(
        project.path(),
        &matrix_toml(&["3.9", "3.11", "3.12"], &FakeSteps::default(), "", &other_entry),
    );

    wheel_matrix()
        .args(["run", "--total-runners", "2", "--runner-index", "0", "--config"])
        .arg(&config)
        .arg("--project-dir")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Skipped 2 of 5 jobs that target other operating systems.",
        ));
}

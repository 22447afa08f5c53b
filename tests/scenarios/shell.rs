//! Test: pipelines against a real `sh`

#![cfg(unix)]

use crate::helpers::*;
use stageline::core::config::PipelineConfig;
use stageline::{ExecutionEngine, PipelineStatus, RunnerConfig, ShellRunner, StageStatus};
use std::time::Duration;

fn shell_engine() -> ExecutionEngine<ShellRunner> {
    ExecutionEngine::new(ShellRunner::new(RunnerConfig::new()))
}

#[tokio::test]
async fn test_real_commands_with_environment_and_secret() {
    let workspace = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
name: "local"
workspace: "{}"
environment:
  GREETING: "hello"
credentials:
  token: {{ value: "t0ps3cret" }}
stages:
  - name: build
    steps:
      - name: write
        run: "printf '%s' \"$GREETING\" > artifact.txt"
      - name: check
        run: "test \"$(cat artifact.txt)\" = ${{GREETING}}"
  - name: publish
    steps:
      - name: leak
        run: "echo using $TOKEN"
        credentials: [token]
"#,
        workspace.path().display()
    );
    let pipeline = PipelineConfig::from_yaml(&yaml).unwrap().to_pipeline();

    let result = shell_engine().execute(&pipeline).await;

    assert!(result.is_success(), "{:?}", result);
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("artifact.txt")).unwrap(),
        "hello"
    );
    let leak = &result.stage("publish").unwrap().steps[0];
    assert_eq!(leak.output.trim(), "using ****");
}

#[tokio::test]
async fn test_real_exit_code_fails_stage() {
    let yaml = r#"
name: "exit"
stages:
  - name: build
    steps:
      - run: "echo building"
  - name: push
    steps:
      - run: "echo denied >&2; exit 3"
  - name: deploy
    steps:
      - run: "echo never"
"#;
    let result = shell_engine().execute(&load(yaml)).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_stages(
        &result,
        &[("build", StageStatus::Succeeded), ("push", StageStatus::Failed)],
    );
    let push = &result.stage("push").unwrap().steps[0];
    assert_eq!(push.exit_code, Some(3));
    assert_eq!(push.output.trim(), "denied");
}

#[tokio::test]
async fn test_real_timeout_kills_process() {
    let yaml = r#"
name: "sleepy"
stages:
  - name: wait
    steps:
      - run: "sleep 30"
        timeout_secs: 1
"#;
    let result = tokio::time::timeout(Duration::from_secs(10), shell_engine().execute(&load(yaml)))
        .await
        .expect("timeout should kill the sleep");

    assert_eq!(result.status, PipelineStatus::Failed);
    assert!(result.stage("wait").unwrap().steps[0].timed_out);
}

#[tokio::test]
async fn test_timeout_stops_every_process_of_a_compound_step() {
    let workspace = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
name: "compound"
workspace: "{}"
stages:
  - name: publish
    steps:
      - run: "true && sh -c 'sleep 2; touch pushed'"
        timeout_secs: 1
"#,
        workspace.path().display()
    );
    let result = shell_engine().execute(&load(&yaml)).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert!(result.stage("publish").unwrap().steps[0].timed_out);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(
        !workspace.path().join("pushed").exists(),
        "step kept running after its timeout"
    );
}

#[tokio::test]
async fn test_cancellation_stops_every_process_of_a_compound_step() {
    let workspace = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
name: "compound"
workspace: "{}"
stages:
  - name: publish
    steps:
      - run: "true && sh -c 'sleep 2; touch pushed'"
"#,
        workspace.path().display()
    );
    let engine = shell_engine();
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let result = engine.execute(&load(&yaml)).await;
    assert!(result.aborted);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!workspace.path().join("pushed").exists());
}

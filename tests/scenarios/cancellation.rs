//! Test: cancelling a run stops it at the next step boundary

use crate::helpers::*;
use stageline::{ExecutionEngine, PipelineStatus, StageStatus};
use std::time::Duration;

#[tokio::test]
async fn test_cancel_during_push_aborts_run() {
    let runtime = FakeContainerRuntime::new();
    runtime.delay_on("docker push", Duration::from_secs(30));

    let engine = ExecutionEngine::from_arc(runtime.clone());
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let pipeline = load(SITE_PIPELINE);
    let result = tokio::time::timeout(Duration::from_secs(5), engine.execute(&pipeline))
        .await
        .expect("cancel should interrupt the in-flight step");

    assert_eq!(result.status, PipelineStatus::Failed);
    assert!(result.aborted);
    assert_stages(
        &result,
        &[("build", StageStatus::Succeeded), ("push", StageStatus::Failed)],
    );

    let upload = &result.stage("push").unwrap().steps[1];
    assert!(upload.cancelled);
    assert_eq!(upload.exit_code, None);
    assert!(runtime.containers().is_empty());
}

#[tokio::test]
async fn test_cancel_before_start_runs_nothing() {
    let runtime = FakeContainerRuntime::new();
    let engine = ExecutionEngine::from_arc(runtime.clone());
    engine.cancellation_token().cancel();

    let result = engine.execute(&load(SITE_PIPELINE)).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert!(result.aborted);
    assert!(result.stages.is_empty());
    assert!(runtime.commands().is_empty());
}

#[tokio::test]
async fn test_cancel_in_best_effort_stage_still_aborts() {
    let yaml = r#"
name: "notify"
stages:
  - name: notify
    best_effort: true
    steps:
      - run: "curl hook"
  - name: deploy
    steps:
      - run: "docker run acme/site"
"#;
    let runtime = FakeContainerRuntime::new();
    runtime.delay_on("curl", Duration::from_secs(30));

    let engine = ExecutionEngine::from_arc(runtime.clone());
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), engine.execute(&load(yaml)))
        .await
        .expect("cancel should interrupt the in-flight step");

    assert!(result.aborted);
    assert_eq!(result.status, PipelineStatus::Failed);
    assert_stages(&result, &[("notify", StageStatus::SkippedBestEffort)]);
}

//! Test: best-effort stages and steps

use crate::helpers::*;
use stageline::{PipelineStatus, StageStatus};

const WITH_NOTIFY: &str = r#"
name: "notify"
environment:
  IMAGE: "acme/site:latest"
stages:
  - name: build
    steps:
      - run: "docker build -t ${IMAGE} ."
  - name: notify
    best_effort: true
    steps:
      - name: hook
        run: "curl -fsS https://hooks.example/notify"
      - name: audit
        run: "curl -fsS https://audit.example"
  - name: cleanup
    steps:
      - name: prune
        run: "docker image prune -f"
      - name: report
        run: "curl -fsS https://metrics.example"
        best_effort: true
      - name: done
        run: "echo done"
"#;

#[tokio::test]
async fn test_best_effort_stage_failure_does_not_halt() {
    let runtime = FakeContainerRuntime::new();
    runtime.fail_on("hooks.example", 22);

    let result = run(runtime.clone(), &load(WITH_NOTIFY)).await;

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert_stages(
        &result,
        &[
            ("build", StageStatus::Succeeded),
            ("notify", StageStatus::SkippedBestEffort),
            ("cleanup", StageStatus::Succeeded),
        ],
    );

    // The stage still stopped at its first failing step
    let notify = result.stage("notify").unwrap();
    assert_eq!(notify.steps.len(), 1);
    assert!(notify.error.is_some());
    assert!(!runtime.commands().iter().any(|c| c.contains("audit.example")));
}

#[tokio::test]
async fn test_best_effort_step_failure_is_recorded_and_skipped() {
    let runtime = FakeContainerRuntime::new();
    runtime.fail_on("metrics.example", 7);

    let result = run(runtime.clone(), &load(WITH_NOTIFY)).await;

    assert!(result.is_success());
    let cleanup = result.stage("cleanup").unwrap();
    assert_eq!(cleanup.status, StageStatus::Succeeded);
    assert_eq!(cleanup.steps.len(), 3);
    assert!(cleanup.steps[1].absorbed);
    assert_eq!(cleanup.steps[1].exit_code, Some(7));
    assert!(cleanup.steps[2].succeeded());
}

#[tokio::test]
async fn test_unbound_variable_in_best_effort_stage_is_fatal() {
    let yaml = r#"
name: "typo"
stages:
  - name: notify
    best_effort: true
    steps:
      - run: "curl ${WEBHOOK_URL}"
  - name: deploy
    steps:
      - run: "docker run acme/site"
"#;
    let runtime = FakeContainerRuntime::new();
    let result = run(runtime.clone(), &load(yaml)).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_stages(&result, &[("notify", StageStatus::Failed)]);
    assert!(result.error.as_deref().unwrap().contains("WEBHOOK_URL"));
    assert!(runtime.commands().is_empty());
}

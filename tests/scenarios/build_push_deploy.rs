//! Test: stages run in order and the first failing stage halts the rest

use crate::helpers::*;
use stageline::{Pipeline, PipelineStatus, Stage, StageStatus, Step};

#[tokio::test]
async fn test_full_pipeline_succeeds() {
    let runtime = FakeContainerRuntime::new();
    let result = run(runtime.clone(), &load(SITE_PIPELINE)).await;

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert_stages(
        &result,
        &[
            ("build", StageStatus::Succeeded),
            ("push", StageStatus::Succeeded),
            ("deploy", StageStatus::Succeeded),
        ],
    );
    assert_eq!(
        runtime.containers().get("site").map(String::as_str),
        Some("acme/site:latest")
    );
}

/// build succeeds, push exits 1: deploy never starts
#[tokio::test]
async fn test_push_failure_stops_before_deploy() {
    let runtime = FakeContainerRuntime::new();
    runtime.fail_on("docker push", 1);

    let result = run(runtime.clone(), &load(SITE_PIPELINE)).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert!(!result.aborted);
    assert_stages(
        &result,
        &[("build", StageStatus::Succeeded), ("push", StageStatus::Failed)],
    );

    let push = result.stage("push").unwrap();
    assert_eq!(push.steps.len(), 2);
    assert_eq!(push.steps[1].exit_code, Some(1));
    assert!(push.error.as_deref().unwrap().contains("upload"));

    assert!(runtime.containers().is_empty());
    assert!(!runtime.commands().iter().any(|c| c.contains("docker run")));
}

#[tokio::test]
async fn test_failing_stage_halts_every_later_stage() {
    const STAGES: usize = 5;

    for failing in 0..STAGES {
        let mut pipeline = Pipeline::new("chain");
        for i in 0..STAGES {
            pipeline = pipeline.with_stage(
                Stage::new(format!("stage-{}", i)).with_step(Step::new("work", format!("work-{}", i))),
            );
        }

        let runtime = FakeContainerRuntime::new();
        runtime.fail_on(&format!("work-{}", failing), 2);
        let result = run(runtime.clone(), &pipeline).await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.stages.len(), failing + 1);
        for (i, stage) in result.stages.iter().enumerate() {
            let expected = if i == failing {
                StageStatus::Failed
            } else {
                StageStatus::Succeeded
            };
            assert_eq!(stage.status, expected, "stage-{}", i);
        }
        assert_eq!(runtime.commands().len(), failing + 1);
    }
}

#[tokio::test]
async fn test_failing_step_skips_rest_of_stage() {
    let pipeline = Pipeline::new("steps").with_stage(
        Stage::new("build")
            .with_step(Step::new("lint", "make lint"))
            .with_step(Step::new("compile", "make build"))
            .with_step(Step::new("package", "make package")),
    );

    let runtime = FakeContainerRuntime::new();
    runtime.fail_on("make build", 2);
    let result = run(runtime.clone(), &pipeline).await;

    let build = result.stage("build").unwrap();
    let names: Vec<&str> = build.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["lint", "compile"]);
    assert_eq!(runtime.commands(), vec!["make lint", "make build"]);
}

#[tokio::test]
async fn test_timed_out_step_fails_pipeline() {
    let yaml = r#"
name: "slow-push"
stages:
  - name: build
    steps:
      - run: "docker build ."
  - name: push
    steps:
      - run: "docker push acme/site"
        timeout_secs: 1
  - name: deploy
    steps:
      - run: "docker run acme/site"
"#;
    let runtime = FakeContainerRuntime::new();
    runtime.delay_on("docker push", std::time::Duration::from_secs(10));

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        run(runtime.clone(), &load(yaml)),
    )
    .await
    .expect("timeout should end the step");

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_stages(
        &result,
        &[("build", StageStatus::Succeeded), ("push", StageStatus::Failed)],
    );
    let step = &result.stage("push").unwrap().steps[0];
    assert!(step.timed_out);
    assert_eq!(step.exit_code, None);
    assert!(result.stage("push").unwrap().error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_result_serializes_for_reporting() {
    let runtime = FakeContainerRuntime::new();
    runtime.fail_on("docker push", 1);
    let result = run(runtime, &load(SITE_PIPELINE)).await;

    let json: serde_json::Value = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "Failed");
    assert_eq!(json["stages"][0]["name"], "build");
    assert_eq!(json["stages"][0]["status"], "Succeeded");
    assert_eq!(json["stages"][1]["status"], "Failed");
    assert_eq!(json["stages"].as_array().unwrap().len(), 2);
}

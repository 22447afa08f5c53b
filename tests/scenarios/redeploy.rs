//! Test: redeploying converges to a single running instance

use crate::helpers::*;
use stageline::{Pipeline, PipelineStatus, Stage, StageStatus};

const REDEPLOY: &str = r#"
name: "redeploy"
environment:
  IMAGE: "acme/site:v1"
stages:
  - name: deploy
    redeploy:
      container: "site"
      image: "${IMAGE}"
      args: "-p 8080:80"
"#;

#[tokio::test]
async fn test_first_deploy_absorbs_missing_container() {
    let runtime = FakeContainerRuntime::new();
    let result = run(runtime.clone(), &load(REDEPLOY)).await;

    assert_eq!(result.status, PipelineStatus::Succeeded);
    let deploy = result.stage("deploy").unwrap();
    assert_eq!(deploy.status, StageStatus::Succeeded);

    let remove = &deploy.steps[0];
    assert_eq!(remove.name, "remove-previous");
    assert_eq!(remove.exit_code, Some(1));
    assert!(remove.absorbed);
    assert!(remove.output.contains("No such container"));

    assert!(deploy.steps[1].succeeded());
    assert_eq!(runtime.containers().len(), 1);
}

#[tokio::test]
async fn test_running_twice_leaves_one_instance() {
    let runtime = FakeContainerRuntime::new();
    let pipeline = load(REDEPLOY);

    let first = run(runtime.clone(), &pipeline).await;
    let second = run(runtime.clone(), &pipeline).await;

    assert!(first.is_success());
    assert!(second.is_success());

    // Second run removed the first instance instead of conflicting
    let remove = &second.stage("deploy").unwrap().steps[0];
    assert!(remove.succeeded());
    assert!(!remove.absorbed);

    let containers = runtime.containers();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers.get("site").map(String::as_str), Some("acme/site:v1"));
}

#[tokio::test]
async fn test_redeploy_replaces_foreign_instance_with_new_image() {
    let runtime = FakeContainerRuntime::new();
    runtime.seed("site", "acme/site:v0");

    let pipeline = Pipeline::new("programmatic")
        .with_env("TAG", "v2")
        .with_stage(Stage::redeploy("deploy", "site", "acme/site:${TAG}", None));
    let result = run(runtime.clone(), &pipeline).await;

    assert!(result.is_success());
    assert_eq!(
        runtime.containers().get("site").map(String::as_str),
        Some("acme/site:v2")
    );
    assert_eq!(
        runtime.commands(),
        vec!["docker rm -f site", "docker run -d --name site acme/site:v2"]
    );
}

#[tokio::test]
async fn test_create_failure_still_fails_stage() {
    let runtime = FakeContainerRuntime::new();
    runtime.fail_on("docker run", 125);

    let result = run(runtime.clone(), &load(REDEPLOY)).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    let deploy = result.stage("deploy").unwrap();
    assert_eq!(deploy.status, StageStatus::Failed);
    assert!(!deploy.steps[1].absorbed);
    assert_eq!(deploy.steps[1].exit_code, Some(125));
}

#[tokio::test]
async fn test_custom_container_cli() {
    let yaml = r#"
name: "podman"
stages:
  - name: deploy
    redeploy:
      container: "api"
      image: "acme/api"
      cli: "podman"
"#;
    let runtime = FakeContainerRuntime::new();
    let result = run(runtime.clone(), &load(yaml)).await;

    assert!(result.is_success());
    assert_eq!(
        runtime.commands(),
        vec!["podman rm -f api", "podman run -d --name api acme/api"]
    );
}

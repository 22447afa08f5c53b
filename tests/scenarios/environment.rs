//! Test: environment bindings, overrides and unbound keys

use crate::helpers::*;
use stageline::{
    EnvironmentStore, ExecutionEngine, Pipeline, PipelineError, PipelineStatus, Stage, StageStatus,
    Step,
};

#[tokio::test]
async fn test_unbound_key_fails_with_unbound_variable() {
    let pipeline = Pipeline::new("unbound")
        .with_env("IMAGE", "acme/site")
        .with_stage(Stage::new("build").with_step(Step::new("build", "docker build -t ${IMAGE} .")))
        .with_stage(Stage::new("push").with_step(Step::new("push", "docker push ${REGISTRY}/${IMAGE}")))
        .with_stage(Stage::new("deploy").with_step(Step::new("run", "docker run ${IMAGE}")));

    let runtime = FakeContainerRuntime::new();
    let result = run(runtime.clone(), &pipeline).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_stages(
        &result,
        &[("build", StageStatus::Succeeded), ("push", StageStatus::Failed)],
    );
    assert_eq!(
        result.error.as_deref(),
        Some(PipelineError::UnboundVariable("REGISTRY".to_string()).to_string().as_str())
    );
    assert_eq!(runtime.commands(), vec!["docker build -t acme/site ."]);
}

#[tokio::test]
async fn test_declared_env_key_must_be_bound() {
    let yaml = r#"
name: "explicit-env"
stages:
  - name: build
    steps:
      - run: "make release"
        env: [RELEASE_TAG]
"#;
    let runtime = FakeContainerRuntime::new();
    let result = run(runtime.clone(), &load(yaml)).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("RELEASE_TAG"));
    assert!(runtime.commands().is_empty());
}

#[tokio::test]
async fn test_overrides_apply_to_the_whole_run() {
    let runtime = FakeContainerRuntime::new();
    let pipeline = load(SITE_PIPELINE);

    let mut env = pipeline.environment_store();
    env.set("IMAGE", "acme/site:v2").unwrap();
    env.set("CONTAINER", "site-canary").unwrap();

    let result = ExecutionEngine::from_arc(runtime.clone())
        .execute_with_environment(&pipeline, env)
        .await;

    assert!(result.is_success());
    assert_eq!(runtime.commands()[0], "docker build -t acme/site:v2 .");
    assert_eq!(
        runtime.containers().get("site-canary").map(String::as_str),
        Some("acme/site:v2")
    );
}

#[tokio::test]
async fn test_each_run_gets_a_fresh_environment() {
    let runtime = FakeContainerRuntime::new();
    let pipeline = load(SITE_PIPELINE);
    let engine = ExecutionEngine::from_arc(runtime.clone());

    let mut env = pipeline.environment_store();
    env.set("IMAGE", "acme/site:v2").unwrap();
    engine.execute_with_environment(&pipeline, env).await;
    engine.execute(&pipeline).await;

    let builds: Vec<String> = runtime
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("docker build"))
        .collect();
    assert_eq!(
        builds,
        vec!["docker build -t acme/site:v2 .", "docker build -t acme/site:latest ."]
    );
}

#[test]
fn test_sealed_store_rejects_writes() {
    let mut env = EnvironmentStore::new();
    env.set("IMAGE", "a").unwrap();
    env.seal();

    assert_eq!(
        env.set("IMAGE", "b"),
        Err(PipelineError::EnvironmentSealed("IMAGE".to_string()))
    );
    assert_eq!(env.get("IMAGE").unwrap(), "a");
}

use stageline::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use stageline::cli::output::*;
use stageline::cli::{Cli, Command};
use stageline::core::config::PipelineConfig;
use stageline::core::PipelineStatus;
use stageline::execution::{ExecutionEngine, ExecutionEvent};
#[cfg(not(feature = "sqlite"))]
use stageline::persistence::InMemoryPersistence;
use stageline::persistence::{create_summary, ExecutionSummary, PersistenceBackend};
use stageline::runner::{RunnerConfig, ShellRunner};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    let ok = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await.map(|_| true)?,
        Command::History(cmd) => show_history(cmd).await.map(|_| true)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(
        stageline::persistence::SqliteExecutionStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    warn!("Built without the sqlite feature, history is not persisted");
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<bool> {
    let config = PipelineConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load pipeline config {}", cmd.file))?;
    let pipeline = config.to_pipeline();

    if !cmd.json {
        println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());
    }

    // Overrides land in the run's store before it is sealed
    let mut env = pipeline.environment_store();
    for (key, value) in &cmd.vars {
        env.set(key.clone(), value.clone())?;
        if !cmd.json {
            println!(
                "{} Variable override: {} = {}",
                INFO,
                style(key).cyan(),
                style(value).dim()
            );
        }
    }

    let store = if cmd.no_history {
        None
    } else {
        Some(history_store().await?)
    };

    // The engine passes the pipeline's workspace with every invocation
    let runner = ShellRunner::new(RunnerConfig::new().with_shell(pipeline.shell.clone()));
    let engine = ExecutionEngine::new(runner);

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling pipeline");
            cancel.cancel();
        }
    });

    if !cmd.json {
        let bar = create_progress_bar(pipeline.stages.len());
        engine
            .add_event_handler(move |event| {
                bar.println(format_execution_event(&event));
                match &event {
                    ExecutionEvent::StageStarted { stage } => bar.set_message(stage.clone()),
                    ExecutionEvent::StageFinished { .. } => bar.inc(1),
                    ExecutionEvent::PipelineFinished { .. } => bar.finish_and_clear(),
                    _ => {}
                }
            })
            .await;
        println!();
    }

    let result = engine.execute_with_environment(&pipeline, env).await;

    if let Some(store) = &store {
        let summary = create_summary(&result);
        match store.save_execution(&summary).await {
            Ok(()) if !cmd.json => println!(
                "\n{} Execution saved to history (ID: {})",
                INFO,
                style(summary.execution_id).dim()
            ),
            Ok(()) => {}
            Err(e) => warn!("Failed to save execution history: {:#}", e),
        }
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.is_success() {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&pipeline.name).bold(),
            format_status(result.status, result.aborted)
        );
        for stage in &result.stages {
            println!("  {} {}", style(&stage.name).bold(), format_stage_status(stage.status));
            for step in stage.steps.iter().filter(|s| !s.succeeded() && !s.absorbed) {
                if !step.output.is_empty() {
                    println!("{}", format_output(&step.output, 10));
                }
            }
        }
        if let Some(e) = &result.error {
            error!("{}", e);
        }
    }

    Ok(result.is_success())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<bool> {
    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            if cmd.json {
                let json = serde_json::json!({
                    "valid": true,
                    "name": config.name,
                    "stages": config.stages.iter().map(|s| &s.name).collect::<Vec<_>>(),
                    "credentials": config.credentials.keys().collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
                return Ok(true);
            }

            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Stages: {}", style(config.stages.len()).cyan());
            println!("  Environment: {}", style(config.environment_len()).cyan());
            println!("  Credentials: {}", style(config.credentials.len()).cyan());
            for stage in &config.to_pipeline().stages {
                let marker = if stage.best_effort { " (best effort)" } else { "" };
                println!(
                    "    {} {}{}",
                    style(&stage.name).bold(),
                    style(format!("{} steps", stage.steps.len())).dim(),
                    marker
                );
            }
            Ok(true)
        }
        Err(e) => {
            if cmd.json {
                let json = serde_json::json!({ "valid": false, "error": format!("{:#}", e) });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            Ok(false)
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = history_store().await?;
    let pipelines = store.list_pipelines().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let executions = store.list_executions(pipeline).await?;
            json_data.push(serde_json::json!({
                "name": pipeline,
                "execution_count": executions.len(),
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline_name in &pipelines {
        if cmd.with_counts {
            let executions = store.list_executions(pipeline_name).await?;
            let succeeded = executions
                .iter()
                .filter(|e| e.status == PipelineStatus::Succeeded)
                .count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(executions.len()).cyan(),
                style(succeeded).green(),
                style(executions.len() - succeeded).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = history_store().await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_execution_details(&summary, cmd.details)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let executions: Vec<ExecutionSummary> = match &cmd.pipeline {
        Some(pipeline_name) => store
            .list_executions(pipeline_name)
            .await?
            .into_iter()
            .take(cmd.limit)
            .collect(),
        None => store.list_recent(cmd.limit).await?,
    };

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
        if cmd.details {
            print_execution_details(summary, false)?;
        }
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status, summary.aborted));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    println!("  Completed: {}", style(summary.completed_at.to_rfc3339()).dim());
    if let Ok(duration) = summary.duration().to_std() {
        println!("  Duration: {}", style(format_duration(duration)).dim());
    }
    for stage in &summary.stages {
        let mut line = format!("    {} {}", style(&stage.name).bold(), format_stage_status(stage.status));
        if let Some(error) = &stage.error {
            line.push_str(&format!(": {}", style(error).dim()));
        }
        println!("{}", line);
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

//! CLI output formatting

use crate::{
    core::{PipelineStatus, StageStatus, StepRecord},
    execution::ExecutionEvent,
    persistence::ExecutionSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Progress bar counting finished stages
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a stage status for display
pub fn format_stage_status(status: StageStatus) -> String {
    match status {
        StageStatus::Pending => style("PENDING").dim().to_string(),
        StageStatus::Running => style("RUNNING").yellow().to_string(),
        StageStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        StageStatus::Failed => style("FAILED").red().to_string(),
        StageStatus::SkippedBestEffort => style("SKIPPED (best effort)").yellow().to_string(),
    }
}

/// Format a pipeline status for display
pub fn format_status(status: PipelineStatus, aborted: bool) -> String {
    match (status, aborted) {
        (PipelineStatus::Succeeded, _) => style("SUCCEEDED").green().to_string(),
        (PipelineStatus::Failed, true) => style("ABORTED").yellow().to_string(),
        (PipelineStatus::Failed, false) => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        PipelineStatus::Succeeded => CHECK,
        PipelineStatus::Failed => CROSS,
    };
    let stages: Vec<String> = summary
        .stages
        .iter()
        .map(|stage| format!("{}:{}", stage.name, stage.status))
        .collect();

    format!(
        "{} {} - {} - {} - {} - {}",
        status_icon,
        style(short_id(&summary.execution_id)).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status, summary.aborted),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim(),
        style(stages.join(" ")).cyan()
    )
}

fn format_step_record(stage: &str, record: &StepRecord) -> String {
    let label = format!("{}/{}", stage, record.name);
    if record.cancelled {
        format!("{} {} cancelled", WARN, style(label).yellow())
    } else if record.timed_out {
        format!("{} {} timed out", CROSS, style(label).red())
    } else if record.succeeded() {
        format!(
            "{} {} {}",
            CHECK,
            style(label).green(),
            style(format!("({} ms)", record.duration_ms)).dim()
        )
    } else if record.absorbed {
        format!(
            "{} {} exited {} (ignored, best effort)",
            WARN,
            style(label).yellow(),
            record.exit_code.unwrap_or(-1)
        )
    } else {
        format!(
            "{} {} exited {}",
            CROSS,
            style(label).red(),
            record.exit_code.unwrap_or(-1)
        )
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_stages,
        } => format!(
            "{} Starting pipeline {} ({}, {} stages)",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(execution_id)).dim(),
            total_stages
        ),
        ExecutionEvent::StageStarted { stage } => {
            format!("{} Stage {}", INFO, style(stage).bold())
        }
        ExecutionEvent::StepStarted { stage, step, command } => format!(
            "{} {}/{}: {}",
            SPINNER,
            style(stage).dim(),
            style(step).cyan(),
            style(command).dim()
        ),
        ExecutionEvent::StepFinished { stage, record } => format_step_record(stage, record),
        ExecutionEvent::StageFinished { result } => {
            let mut line = format!(
                "{} Stage {} {}",
                INFO,
                style(&result.name).bold(),
                format_stage_status(result.status)
            );
            if let Some(error) = &result.error {
                line.push_str(&format!(": {}", style(error).dim()));
            }
            line
        }
        ExecutionEvent::PipelineFinished {
            execution_id,
            status,
            aborted,
        } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(short_id(execution_id)).dim(),
            format_status(*status, *aborted)
        ),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// Human readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

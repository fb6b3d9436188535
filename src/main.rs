use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tekrun::cli::commands::{RunCommand, ValidateCommand};
use tekrun::cli::output::*;
use tekrun::cli::{Cli, Command};
use tekrun::core::{CrdSet, PipelineStatus, TaskGraph};
use tekrun::{DockerRuntime, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await,
        Command::Validate(cmd) => validate_pipelines(cmd),
    }
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let crds = load_crds(&cmd.file)?;
    let pipeline = crds.select_pipeline(cmd.pipeline.as_deref())?;

    println!(
        "{} Running pipeline: {}",
        ROCKET,
        style(pipeline.name()).bold()
    );

    let runtime = Arc::new(DockerRuntime::connect()?);
    let mut orchestrator = Orchestrator::new(runtime);
    if let Some(limit) = cmd.max_parallel {
        orchestrator = orchestrator.with_max_parallel(limit);
    }

    match orchestrator.run(pipeline, &crds).await {
        Ok(state) => match state.status {
            PipelineStatus::Failed(status_code) => {
                println!(
                    "\n{} {} {}",
                    CROSS,
                    style(pipeline.name()).bold(),
                    format_status(state.status)
                );
                // The pipeline's exit status becomes ours.
                std::process::exit(status_code as i32);
            }
            status => {
                println!(
                    "\n{} {} {}",
                    CHECK,
                    style(pipeline.name()).bold(),
                    format_status(status)
                );
                Ok(())
            }
        },
        Err(e) => {
            println!("\n{} {}", CROSS, style(&e).red());
            std::process::exit(1);
        }
    }
}

/// Per-pipeline validation result, also the `--json` document.
#[derive(Debug, Serialize)]
struct ValidationReport {
    pipeline: String,
    valid: bool,
    errors: Vec<String>,
}

fn validate_pipelines(cmd: &ValidateCommand) -> Result<()> {
    let crds = load_crds(&cmd.file)?;

    let mut names: Vec<&String> = crds.pipelines.keys().collect();
    names.sort();

    let mut reports = Vec::new();
    for name in names {
        reports.push(validate_one(&crds, name));
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            if report.valid {
                println!("{} {} is valid", CHECK, style(&report.pipeline).bold());
            } else {
                println!("{} {} is invalid:", CROSS, style(&report.pipeline).bold());
                for error in &report.errors {
                    println!("    {}", style(error).red());
                }
            }
        }
    }

    if reports.iter().any(|r| !r.valid) {
        std::process::exit(1);
    }
    Ok(())
}

fn validate_one(crds: &CrdSet, name: &str) -> ValidationReport {
    let mut errors = Vec::new();

    if let Some(pipeline) = crds.pipeline(name) {
        if let Err(e) = TaskGraph::build(&pipeline.spec.tasks) {
            errors.push(e.to_string());
        }

        for decl in &pipeline.spec.resources {
            if crds.resource(&decl.name).is_none() {
                errors.push(format!("no resource with name '{}'", decl.name));
            }
        }

        for node in &pipeline.spec.tasks {
            match crds.task(&node.task_ref.name) {
                None => errors.push(format!(
                    "pipeline task '{}' references unknown Task '{}'",
                    node.name, node.task_ref.name
                )),
                Some(task) => {
                    for step in &task.spec.steps {
                        if step.resolved_command().is_empty() {
                            errors.push(format!(
                                "step '{}' of Task '{}' has no command",
                                step.name, node.task_ref.name
                            ));
                        }
                    }
                }
            }
        }
    } else {
        errors.push(format!("no Pipeline with name '{}'", name));
    }

    ValidationReport {
        pipeline: name.to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

fn load_crds(path: &str) -> Result<CrdSet> {
    if path == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("can't read pipeline definitions from stdin")?;
        CrdSet::from_yaml(&input)
    } else {
        CrdSet::from_file(path)
    }
}

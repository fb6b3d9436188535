//! CLI command definitions

use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the pipeline YAML file, or `-` for stdin
    #[arg(short, long, default_value = "pipeline.yaml")]
    pub file: String,

    /// Pipeline to run when the file defines more than one
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Maximum number of tasks running at the same time
    #[arg(long)]
    pub max_parallel: Option<usize>,
}

/// Validate pipeline definitions
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the pipeline YAML file, or `-` for stdin
    #[arg(short, long, default_value = "pipeline.yaml")]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

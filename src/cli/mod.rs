//! Command-line interface

pub mod commands;
pub mod output;

use std::ffi::OsString;

use clap::{Parser, Subcommand};
use commands::{RunCommand, ValidateCommand};

/// Run Tekton-style pipelines against a local container runtime
#[derive(Debug, Parser, Clone)]
#[command(name = "tekrun")]
#[command(version)]
#[command(about = "Run Tekton-style pipelines on a local Docker daemon", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate pipeline definitions without running anything
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["tekrun", "run"]).unwrap();
        match cli.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.file, "pipeline.yaml");
                assert!(cmd.pipeline.is_none());
                assert!(cmd.max_parallel.is_none());
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_run_with_options() {
        let cli = Cli::try_parse_from([
            "tekrun",
            "run",
            "--file",
            "ci.yaml",
            "--pipeline",
            "release",
            "--max-parallel",
            "2",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.file, "ci.yaml");
                assert_eq!(cmd.pipeline.as_deref(), Some("release"));
                assert_eq!(cmd.max_parallel, Some(2));
            }
            other => panic!("expected run, got {other:?}"),
        }
    }
}

//! Task and step manifests

use serde::{Deserialize, Serialize};

use crate::core::config::Metadata;

/// A `Task` manifest: a named, ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub metadata: Metadata,
    pub spec: TaskSpec,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub steps: Vec<Step>,
}

/// One step: an image plus the command to run in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,

    pub image: String,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub image_pull_policy: PullPolicy,
}

impl Step {
    /// The full command line: `command` followed by `args`.
    pub fn resolved_command(&self) -> Vec<String> {
        self.command
            .iter()
            .chain(self.args.iter())
            .cloned()
            .collect()
    }
}

/// When to pull the step's image, following the Kubernetes spellings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_command_concatenates_args() {
        let step: Step = serde_yaml::from_str(
            r#"
name: compile
image: golang:1.22
command: ["go", "build"]
args: ["./..."]
"#,
        )
        .unwrap();

        assert_eq!(step.resolved_command(), vec!["go", "build", "./..."]);
    }

    #[test]
    fn test_pull_policy_defaults_to_if_not_present() {
        let step: Step = serde_yaml::from_str(
            r#"
name: lint
image: alpine:latest
command: ["true"]
"#,
        )
        .unwrap();

        assert_eq!(step.image_pull_policy, PullPolicy::IfNotPresent);
    }

    #[test]
    fn test_pull_policy_uses_kubernetes_spelling() {
        let step: Step = serde_yaml::from_str(
            r#"
name: fetch
image: alpine:latest
command: ["true"]
imagePullPolicy: Never
"#,
        )
        .unwrap();

        assert_eq!(step.image_pull_policy, PullPolicy::Never);
    }
}

//! Engine error taxonomy
//!
//! Three buckets, matching what a caller can do about them: fix the
//! manifests (`Configuration`), fix image availability (`ImagePull`), or
//! look at the host (`Execution`). A step exiting non-zero is never an
//! error; it is an exit code carried through the run report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The loaded manifests are invalid: bad references, cycles, empty
    /// commands, unresolvable resources.
    #[error("invalid pipeline configuration: {0}")]
    Configuration(String),

    /// An image required by a step could not be made available.
    #[error("can't pull image '{image}': {reason}")]
    ImagePull { image: String, reason: String },

    /// The container runtime or the engine itself failed mid-run.
    #[error("execution failed: {0}")]
    Execution(String),
}

impl EngineError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, EngineError::Configuration(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EngineError::Configuration("duplicate task 'a'".to_string());
        assert_eq!(
            err.to_string(),
            "invalid pipeline configuration: duplicate task 'a'"
        );
        assert!(err.is_configuration());

        let err = EngineError::ImagePull {
            image: "alpine:latest".to_string(),
            reason: "not found locally".to_string(),
        };
        assert!(err.to_string().contains("alpine:latest"));
        assert!(!err.is_configuration());
    }
}

//! Error types for orchestration episodes.

use std::path::PathBuf;

use container_env_manager::EnvError;

/// Why an episode did not produce an artifact.
///
/// The `Display` text of each variant is the payload of the error
/// [`StatusEvent`](super::StatusEvent) reported back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Model '{0}' not found")]
    UnknownModel(String),

    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("busy")]
    Busy { environment: String },

    #[error("{0}")]
    Environment(#[from] EnvError),

    #[error("no file generated")]
    NoArtifactFound { directory: PathBuf },
}

impl OrchestrationError {
    /// Rejected before any environment call was made.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            OrchestrationError::UnknownModel(_)
                | OrchestrationError::InvalidTrigger(_)
                | OrchestrationError::Busy { .. }
        )
    }
}

/// Errors loading a model table.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read model table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model table has an empty selector or load path")]
    EmptyEntry,

    #[error("model table is empty")]
    Empty,
}

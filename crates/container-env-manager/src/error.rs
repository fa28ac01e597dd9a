//! Error types for container-env-manager

use thiserror::Error;

/// Errors that can occur while driving the container runtime
#[derive(Error, Debug)]
pub enum EnvError {
    /// Runtime binary (docker, podman, ...) is not installed or not in PATH
    #[error("container runtime '{0}' is not installed or not in PATH")]
    RuntimeNotFound(String),

    /// Listing containers failed
    #[error("container query failed: {0}")]
    QueryFailed(String),

    /// Removing a stale container or starting a fresh one failed
    #[error("failed to start environment '{name}': {reason}")]
    StartFailed { name: String, reason: String },

    /// The command run inside the environment exited non-zero
    #[error("command in environment '{name}' exited with status {exit_code}: {stderr}")]
    ExecFailed {
        name: String,
        exit_code: i32,
        stderr: String,
    },

    /// Stopping the environment failed
    #[error("failed to stop environment '{name}': {reason}")]
    StopFailed { name: String, reason: String },

    /// A runtime call exceeded its time limit and was killed
    #[error("'{command}' timed out after {limit_secs}s")]
    Timeout { command: String, limit_secs: u64 },

    /// IO error while spawning or waiting on the runtime
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Container-Env-Manager: execution environment control for the Musika daemon
//!
//! This crate owns the lifecycle of the long-running container the
//! generation workload runs in. It knows nothing about generation
//! parameters; it only answers "is it running", starts it from a clean
//! slate, runs commands inside it and stops it.
//!
//! ## Key Components
//!
//! - [`EnvironmentController`]: async lifecycle trait the orchestrator drives
//! - [`DockerEnvironment`]: implementation over the `docker` (or compatible) CLI
//! - [`CommandRunner`]: process-spawn seam with timeout, faked in tests

pub mod controller;
pub mod docker;
pub mod error;
pub mod runner;

pub use controller::{ContainerSpec, EnvironmentController, ExecOutcome, VolumeMount};
pub use docker::{DockerConfig, DockerEnvironment};
pub use error::EnvError;
pub use runner::{CommandOutput, CommandRunner, TokioCommandRunner};

/// Result type for container-env-manager operations
pub type Result<T> = std::result::Result<T, EnvError>;

/// Check if the given container runtime CLI is available
pub fn is_runtime_available(runtime: &str) -> bool {
    std::process::Command::new(runtime)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_runtime_is_unavailable() {
        assert!(!is_runtime_available("definitely-not-a-container-runtime"));
    }
}

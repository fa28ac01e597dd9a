//! The environment lifecycle contract.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;

/// A host directory bind-mounted into the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host_path: PathBuf,
    pub container_path: String,
}

impl VolumeMount {
    pub fn new(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        VolumeMount {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }

    /// `host:container` form used by `-v`.
    pub fn to_arg(&self) -> String {
        format!("{}:{}", self.host_path.display(), self.container_path)
    }
}

/// Everything needed to (re)create the execution environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name; the identity every lifecycle call is keyed on.
    pub name: String,
    /// Image reference to start from.
    pub image: String,
    /// Volume mounts attached at start.
    pub mounts: Vec<VolumeMount>,
    /// GPU request passed to `--gpus` (e.g. `all`); `None` runs without GPUs.
    pub gpus: Option<String>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        ContainerSpec {
            name: name.into(),
            image: image.into(),
            mounts: Vec::new(),
            gpus: None,
        }
    }

    pub fn with_mount(mut self, mount: VolumeMount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn with_gpus(mut self, gpus: impl Into<String>) -> Self {
        self.gpus = Some(gpus.into());
        self
    }
}

/// Successful completion of a command run inside the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Lifecycle operations against a named execution environment.
///
/// Liveness is never cached: every decision re-queries the runtime.
#[async_trait]
pub trait EnvironmentController: Send + Sync {
    /// Query whether a container with this name is currently running.
    async fn query_running(&self, name: &str) -> Result<bool>;

    /// [`query_running`](Self::query_running) with query errors collapsed
    /// to `false` after logging a warning.
    async fn is_running(&self, name: &str) -> bool {
        match self.query_running(name).await {
            Ok(running) => running,
            Err(err) => {
                warn!(
                    event = "environment.query_failed",
                    environment = %name,
                    error = %err,
                    "liveness query failed, treating environment as not running"
                );
                false
            }
        }
    }

    /// Remove any container with the spec's name (running or not) and start
    /// a fresh one with the spec's mounts attached.
    async fn ensure_running(&self, spec: &ContainerSpec) -> Result<()>;

    /// Run `argv` inside the environment and wait for it to finish.
    ///
    /// Non-zero exit is an [`EnvError::ExecFailed`](crate::EnvError::ExecFailed);
    /// exceeding `timeout` is an [`EnvError::Timeout`](crate::EnvError::Timeout).
    async fn exec(
        &self,
        name: &str,
        argv: &[String],
        timeout: Option<Duration>,
    ) -> Result<ExecOutcome>;

    /// Stop the environment; no-op when it is not running.
    async fn stop(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_mount_arg() {
        let mount = VolumeMount::new("/home/me/musika_outputs", "/output");
        assert_eq!(mount.to_arg(), "/home/me/musika_outputs:/output");
    }

    #[test]
    fn test_container_spec_builder() {
        let spec = ContainerSpec::new("musika-container", "plurdist/musika:latest")
            .with_mount(VolumeMount::new("/tmp/out", "/output"))
            .with_gpus("all");
        assert_eq!(spec.mounts.len(), 1);
        assert_eq!(spec.gpus.as_deref(), Some("all"));
    }
}

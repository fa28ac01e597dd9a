//! Docker CLI backed environment controller
//!
//! Talks to the container runtime purely through its CLI. Any
//! docker-compatible binary (e.g. `podman`) works by changing
//! [`DockerConfig::runtime`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::controller::{ContainerSpec, EnvironmentController, ExecOutcome};
use crate::error::EnvError;
use crate::runner::{CommandOutput, CommandRunner, TokioCommandRunner};
use crate::Result;

/// Runtime CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Runtime binary name
    pub runtime: String,
    /// Pause after `run` before the container is considered usable
    pub startup_grace: Duration,
    /// Limit for short control calls (`ps`, `rm`, `run`, `stop`)
    pub control_timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        DockerConfig {
            runtime: "docker".to_string(),
            startup_grace: Duration::from_secs(2),
            control_timeout: Duration::from_secs(60),
        }
    }
}

impl DockerConfig {
    /// Create config for a specific runtime binary
    pub fn new(runtime: &str) -> Self {
        DockerConfig {
            runtime: runtime.to_string(),
            ..Default::default()
        }
    }

    /// Set the post-start grace period
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }
}

/// [`EnvironmentController`] over the docker CLI
pub struct DockerEnvironment<R = TokioCommandRunner> {
    config: DockerConfig,
    runner: R,
}

impl DockerEnvironment<TokioCommandRunner> {
    /// Create a controller that spawns real runtime processes
    pub fn new(config: DockerConfig) -> Self {
        Self::with_runner(config, TokioCommandRunner)
    }
}

impl<R: CommandRunner> DockerEnvironment<R> {
    /// Create a controller with a custom process runner
    pub fn with_runner(config: DockerConfig, runner: R) -> Self {
        DockerEnvironment { config, runner }
    }

    async fn control(&self, args: Vec<String>) -> Result<CommandOutput> {
        self.runner
            .run(&self.config.runtime, &args, Some(self.config.control_timeout))
            .await
    }

    /// Container ids whose name is exactly `name`; `all` includes stopped ones.
    async fn container_ids(&self, name: &str, all: bool) -> Result<Vec<String>> {
        let mut args = vec!["ps".to_string()];
        if all {
            args.push("-a".to_string());
        }
        args.extend([
            "--filter".to_string(),
            format!("name=^{name}$"),
            "--format".to_string(),
            "{{.ID}}".to_string(),
        ]);

        let out = self.control(args).await?;
        if !out.success() {
            return Err(EnvError::QueryFailed(out.stderr.trim().to_string()));
        }

        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn run_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string(), "-dit".to_string()];
        if let Some(gpus) = &spec.gpus {
            args.push("--gpus".to_string());
            args.push(gpus.clone());
        }
        args.push("--name".to_string());
        args.push(spec.name.clone());
        for mount in &spec.mounts {
            args.push("-v".to_string());
            args.push(mount.to_arg());
        }
        args.push(spec.image.clone());
        args
    }
}

#[async_trait]
impl<R: CommandRunner> EnvironmentController for DockerEnvironment<R> {
    async fn query_running(&self, name: &str) -> Result<bool> {
        Ok(!self.container_ids(name, false).await?.is_empty())
    }

    async fn ensure_running(&self, spec: &ContainerSpec) -> Result<()> {
        let start_failed = |reason: String| EnvError::StartFailed {
            name: spec.name.clone(),
            reason,
        };

        let existing = match self.container_ids(&spec.name, true).await {
            Ok(ids) => ids,
            Err(EnvError::QueryFailed(reason)) => return Err(start_failed(reason)),
            Err(err) => return Err(err),
        };

        for id in existing {
            info!(environment = %spec.name, container_id = %id, "removing existing container");
            let out = self
                .control(vec!["rm".to_string(), "-f".to_string(), id.clone()])
                .await?;
            if !out.success() {
                return Err(start_failed(format!(
                    "could not remove container {id}: {}",
                    out.stderr.trim()
                )));
            }
        }

        info!(environment = %spec.name, image = %spec.image, "starting container");
        let out = self.control(Self::run_args(spec)).await?;
        if !out.success() {
            return Err(start_failed(out.stderr.trim().to_string()));
        }

        if !self.config.startup_grace.is_zero() {
            tokio::time::sleep(self.config.startup_grace).await;
        }
        Ok(())
    }

    async fn exec(
        &self,
        name: &str,
        argv: &[String],
        timeout: Option<Duration>,
    ) -> Result<ExecOutcome> {
        let mut args = Vec::with_capacity(argv.len() + 2);
        args.push("exec".to_string());
        args.push(name.to_string());
        args.extend(argv.iter().cloned());

        debug!(environment = %name, argv = ?argv, "exec");
        let out = self.runner.run(&self.config.runtime, &args, timeout).await?;
        if !out.success() {
            return Err(EnvError::ExecFailed {
                name: name.to_string(),
                exit_code: out.exit_code,
                stderr: tail(&out.stderr, 400),
            });
        }

        Ok(ExecOutcome {
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            duration_ms: out.duration_ms,
        })
    }

    async fn stop(&self, name: &str) -> Result<()> {
        if !self.is_running(name).await {
            debug!(environment = %name, "not running, nothing to stop");
            return Ok(());
        }

        info!(environment = %name, "stopping container");
        let out = self
            .control(vec!["stop".to_string(), name.to_string()])
            .await
            .map_err(|err| EnvError::StopFailed {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        if !out.success() {
            warn!(environment = %name, stderr = %out.stderr.trim(), "stop returned non-zero");
            return Err(EnvError::StopFailed {
                name: name.to_string(),
                reason: out.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Last `max` bytes of `text`, trimmed, on a char boundary.
fn tail(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= max {
        return trimmed.to_string();
    }
    let mut cut = trimmed.len() - max;
    while !trimmed.is_char_boundary(cut) {
        cut += 1;
    }
    trimmed[cut..].to_string()
}

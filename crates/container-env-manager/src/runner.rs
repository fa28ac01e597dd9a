//! Process invocation for the container runtime CLI.
//!
//! Everything the [`DockerEnvironment`](crate::DockerEnvironment) does goes
//! through [`CommandRunner::run`] as an argument vector, never a shell string.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::EnvError;
use crate::Result;

/// Captured result of one runtime CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when the process was terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs an external program to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, killing it if `timeout` elapses first.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let start = Instant::now();
        debug!(program = %program, args = ?args, "spawning");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => EnvError::RuntimeNotFound(program.to_string()),
                _ => EnvError::Io(err),
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| EnvError::Timeout {
                    command: describe(program, args),
                    limit_secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn describe(program: &str, args: &[String]) -> String {
    match args.first() {
        Some(sub) => format!("{program} {sub}"),
        None => program.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_command_output_success() {
        let ok = CommandOutput::default();
        assert!(ok.success());

        let failed = CommandOutput {
            exit_code: 2,
            ..Default::default()
        };
        assert!(!failed.success());
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = TokioCommandRunner
            .run("echo", &args(&["hello"]), None)
            .await
            .expect("echo should run");
        assert!(out.success());
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_reports_nonzero_exit() {
        let out = TokioCommandRunner
            .run("false", &[], None)
            .await
            .expect("false should run");
        assert!(!out.success());
        assert_ne!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_program_maps_to_runtime_not_found() {
        let err = TokioCommandRunner
            .run("no-such-runtime-binary", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvError::RuntimeNotFound(name) if name == "no-such-runtime-binary"));
    }

    #[tokio::test]
    async fn test_timeout_kills_long_running_command() {
        let err = TokioCommandRunner
            .run("sleep", &args(&["5"]), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        match err {
            EnvError::Timeout { command, .. } => assert_eq!(command, "sleep 5"),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}

//! In-memory fakes for the orchestrator's collaborators (testing only)
//!
//! Provides `FakeEnvironment` and `RecordingSink`, which satisfy the
//! `EnvironmentController` and `NotificationSink` contracts without a
//! container runtime or a network.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use container_env_manager::{ContainerSpec, EnvError, EnvironmentController, ExecOutcome};

use crate::domain::StatusEvent;
use crate::sink::NotificationSink;

// ---------------------------------------------------------------------------
// FakeEnvironment
// ---------------------------------------------------------------------------

/// A lifecycle call observed by [`FakeEnvironment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvCall {
    QueryRunning(String),
    EnsureRunning(String),
    Exec { name: String, argv: Vec<String> },
    Stop(String),
}

/// Scriptable environment that records every call.
///
/// A successful `exec` optionally writes an artifact file, standing in for
/// the generation workload.
#[derive(Debug, Default)]
pub struct FakeEnvironment {
    calls: Mutex<Vec<EnvCall>>,
    running: Mutex<bool>,
    start_error: Option<String>,
    stop_error: Option<String>,
    query_error: bool,
    exec_exit_code: i32,
    exec_delay: Duration,
    exec_timeout_after: Option<u64>,
    artifact: Option<PathBuf>,
    exec_timeouts: Mutex<Vec<Option<Duration>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_start(mut self, reason: &str) -> Self {
        self.start_error = Some(reason.to_string());
        self
    }

    pub fn failing_stop(mut self, reason: &str) -> Self {
        self.stop_error = Some(reason.to_string());
        self
    }

    pub fn failing_query(mut self) -> Self {
        self.query_error = true;
        self
    }

    pub fn exec_exit_code(mut self, code: i32) -> Self {
        self.exec_exit_code = code;
        self
    }

    pub fn exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = delay;
        self
    }

    /// `exec` fails as if its time limit of `limit_secs` ran out.
    pub fn timing_out(mut self, limit_secs: u64) -> Self {
        self.exec_timeout_after = Some(limit_secs);
        self
    }

    pub fn writes_artifact(mut self, path: impl AsRef<Path>) -> Self {
        self.artifact = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<EnvCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ensure_count(&self) -> usize {
        self.count(|c| matches!(c, EnvCall::EnsureRunning(_)))
    }

    pub fn exec_count(&self) -> usize {
        self.count(|c| matches!(c, EnvCall::Exec { .. }))
    }

    /// Argument vectors of every `exec`, in call order.
    pub fn exec_argvs(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EnvCall::Exec { argv, .. } => Some(argv),
                _ => None,
            })
            .collect()
    }

    pub fn last_exec_timeout(&self) -> Option<Duration> {
        self.exec_timeouts.lock().unwrap().last().copied().flatten()
    }

    /// Highest number of `exec` calls that were in progress at once.
    pub fn max_concurrent_exec(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_marked_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    fn record(&self, call: EnvCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, pred: impl Fn(&EnvCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl EnvironmentController for FakeEnvironment {
    async fn query_running(&self, name: &str) -> container_env_manager::Result<bool> {
        self.record(EnvCall::QueryRunning(name.to_string()));
        if self.query_error {
            return Err(EnvError::QueryFailed("fake runtime unreachable".to_string()));
        }
        Ok(*self.running.lock().unwrap())
    }

    async fn ensure_running(&self, spec: &ContainerSpec) -> container_env_manager::Result<()> {
        self.record(EnvCall::EnsureRunning(spec.name.clone()));
        if let Some(reason) = &self.start_error {
            return Err(EnvError::StartFailed {
                name: spec.name.clone(),
                reason: reason.clone(),
            });
        }
        *self.running.lock().unwrap() = true;
        Ok(())
    }

    async fn exec(
        &self,
        name: &str,
        argv: &[String],
        timeout: Option<Duration>,
    ) -> container_env_manager::Result<ExecOutcome> {
        self.record(EnvCall::Exec {
            name: name.to_string(),
            argv: argv.to_vec(),
        });
        self.exec_timeouts.lock().unwrap().push(timeout);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.exec_delay.is_zero() {
            tokio::time::sleep(self.exec_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(limit_secs) = self.exec_timeout_after {
            return Err(EnvError::Timeout {
                command: argv.join(" "),
                limit_secs,
            });
        }
        if self.exec_exit_code != 0 {
            return Err(EnvError::ExecFailed {
                name: name.to_string(),
                exit_code: self.exec_exit_code,
                stderr: "fake workload failed".to_string(),
            });
        }
        if let Some(path) = &self.artifact {
            std::fs::write(path, b"RIFF")?;
            // Explicit stamp so back-to-back rewrites of one path stay ordered.
            std::fs::File::options()
                .write(true)
                .open(path)?
                .set_modified(SystemTime::now())?;
        }
        Ok(ExecOutcome::default())
    }

    async fn stop(&self, name: &str) -> container_env_manager::Result<()> {
        self.record(EnvCall::Stop(name.to_string()));
        if let Some(reason) = &self.stop_error {
            return Err(EnvError::StopFailed {
                name: name.to_string(),
                reason: reason.clone(),
            });
        }
        *self.running.lock().unwrap() = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Sink that keeps every event in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Result and error events seen so far.
    pub fn terminal_events(&self) -> Vec<StatusEvent> {
        self.events()
            .into_iter()
            .filter(StatusEvent::is_terminal)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: StatusEvent) {
        self.events.lock().unwrap().push(event);
    }
}

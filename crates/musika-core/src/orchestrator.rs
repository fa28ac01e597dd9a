//! Trigger-to-completion state machine.
//!
//! One episode walks
//! `Idle -> Validating -> StartingEnvironment -> Executing -> Locating ->
//! Reporting -> (Stopping) -> Idle`. Any failure jumps straight to a single
//! error report. Episodes against the same environment never overlap: a
//! trigger that arrives while one is in flight is answered with `busy`.

use std::sync::Arc;
use std::time::Instant;

use container_env_manager::EnvironmentController;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::domain::status::{STATUS_COMPLETE, STATUS_STARTING};
use crate::domain::{OrchestrationError, StatusEvent, Trigger};
use crate::obs;
use crate::registry::ModelRegistry;
use crate::sink::NotificationSink;
use crate::watcher::{OutputArtifact, OutputWatcher};

/// Where the orchestrator currently is in an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodePhase {
    Idle,
    Validating,
    StartingEnvironment,
    Executing,
    Locating,
    Reporting,
    Stopping,
}

impl EpisodePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodePhase::Idle => "idle",
            EpisodePhase::Validating => "validating",
            EpisodePhase::StartingEnvironment => "starting_environment",
            EpisodePhase::Executing => "executing",
            EpisodePhase::Locating => "locating",
            EpisodePhase::Reporting => "reporting",
            EpisodePhase::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for EpisodePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives the environment, the output watcher and the sink for each trigger.
pub struct GenerationOrchestrator {
    config: OrchestratorConfig,
    registry: ModelRegistry,
    environment: Arc<dyn EnvironmentController>,
    sink: Arc<dyn NotificationSink>,
    /// Held for the whole episode; guards the environment name.
    episode: Mutex<()>,
    phase: watch::Sender<EpisodePhase>,
}

impl GenerationOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: ModelRegistry,
        environment: Arc<dyn EnvironmentController>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (phase, _) = watch::channel(EpisodePhase::Idle);
        GenerationOrchestrator {
            config,
            registry,
            environment,
            sink,
            episode: Mutex::new(()),
            phase,
        }
    }

    /// Current phase of the in-flight episode, `Idle` when there is none.
    pub fn phase(&self) -> EpisodePhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<EpisodePhase> {
        self.phase.subscribe()
    }

    /// Run one episode for `trigger`.
    ///
    /// Exactly one terminal event (result or error) is sent to the sink
    /// whatever happens; the returned value mirrors it for the caller.
    pub async fn handle(&self, trigger: Trigger) -> Result<OutputArtifact, OrchestrationError> {
        let Ok(_guard) = self.episode.try_lock() else {
            let err = OrchestrationError::Busy {
                environment: self.config.environment_name().to_string(),
            };
            obs::emit_episode_rejected(&trigger.model_selector, &err);
            self.sink.notify(StatusEvent::error(err.to_string())).await;
            return Err(err);
        };

        let episode_id = Uuid::new_v4().to_string();
        let span = obs::episode_span(&episode_id, &trigger.model_selector);
        let started = Instant::now();

        let outcome = self.run_episode(&episode_id, &trigger).instrument(span).await;

        obs::emit_episode_finished(
            &episode_id,
            started.elapsed().as_millis() as u64,
            outcome.as_ref().map(|_| ()),
        );
        self.set_phase(EpisodePhase::Idle);
        outcome
    }

    async fn run_episode(
        &self,
        episode_id: &str,
        trigger: &Trigger,
    ) -> Result<OutputArtifact, OrchestrationError> {
        self.set_phase(EpisodePhase::Validating);
        let load_path = match self.validate(trigger) {
            Ok(path) => path,
            Err(err) => {
                obs::emit_episode_rejected(&trigger.model_selector, &err);
                self.report(Err(&err)).await;
                return Err(err);
            }
        };
        obs::emit_episode_started(
            episode_id,
            &trigger.model_selector,
            trigger.duration_seconds,
            trigger.truncation,
        );

        self.sink.notify(StatusEvent::status(STATUS_STARTING)).await;
        self.set_phase(EpisodePhase::StartingEnvironment);
        if let Err(err) = self.environment.ensure_running(&self.config.environment).await {
            let err = OrchestrationError::from(err);
            self.set_phase(EpisodePhase::Reporting);
            self.report(Err(&err)).await;
            return Err(err);
        }

        let outcome = self.execute_and_locate(&load_path, trigger).await;

        self.set_phase(EpisodePhase::Reporting);
        self.report(outcome.as_ref()).await;

        if self.config.stop_after_episode {
            self.set_phase(EpisodePhase::Stopping);
            let name = self.config.environment_name();
            if let Err(err) = self.environment.stop(name).await {
                obs::emit_stop_failed(name, &err);
            }
        }

        outcome
    }

    fn validate(&self, trigger: &Trigger) -> Result<String, OrchestrationError> {
        let load_path = self.registry.resolve(&trigger.model_selector)?;
        trigger.validate(&self.config.limits)?;
        Ok(load_path.to_string())
    }

    async fn execute_and_locate(
        &self,
        load_path: &str,
        trigger: &Trigger,
    ) -> Result<OutputArtifact, OrchestrationError> {
        self.set_phase(EpisodePhase::Executing);
        // Files already present are never this episode's output.
        let baseline = self.scan().await;
        let argv = self.config.template.build_argv(load_path, trigger);
        let outcome = self
            .environment
            .exec(
                self.config.environment_name(),
                &argv,
                self.config.exec_timeout,
            )
            .await?;
        info!(duration_ms = outcome.duration_ms, "generation finished");

        self.set_phase(EpisodePhase::Locating);
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
        self.locate(baseline.as_ref()).await
    }

    async fn locate(
        &self,
        baseline: Option<&OutputArtifact>,
    ) -> Result<OutputArtifact, OrchestrationError> {
        match self.scan().await {
            Some(found) if found.is_newer_than(baseline) => Ok(found),
            stale => {
                if let Some(stale) = stale {
                    debug!(path = %stale.path.display(), "newest output predates this episode");
                }
                Err(OrchestrationError::NoArtifactFound {
                    directory: self.config.output_dir.clone(),
                })
            }
        }
    }

    async fn scan(&self) -> Option<OutputArtifact> {
        let dir = self.config.output_dir.clone();
        let ext = self.config.artifact_extension.clone();
        tokio::task::spawn_blocking(move || OutputWatcher::latest(&dir, &ext))
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "output scan task failed");
                None
            })
    }

    async fn report(&self, outcome: Result<&OutputArtifact, &OrchestrationError>) {
        match outcome {
            Ok(artifact) => {
                self.sink.notify(StatusEvent::status(STATUS_COMPLETE)).await;
                self.sink
                    .notify(StatusEvent::result(artifact.display_path()))
                    .await;
            }
            Err(err) => {
                self.sink.notify(StatusEvent::error(err.to_string())).await;
            }
        }
    }

    fn set_phase(&self, phase: EpisodePhase) {
        obs::emit_phase(phase);
        self.phase.send_replace(phase);
    }
}

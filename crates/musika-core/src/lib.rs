//! Musika Core Library
//!
//! Trigger-to-completion orchestration for remote Musika generation: a
//! trigger names a model and generation parameters, the orchestrator makes
//! sure the container is up, runs the generator inside it, finds the
//! resulting file and reports back.

pub mod config;
pub mod domain;
pub mod fakes;
pub mod generation;
pub mod obs;
pub mod orchestrator;
pub mod registry;
pub mod sink;
pub mod telemetry;
pub mod watcher;
pub mod wire;

pub use config::OrchestratorConfig;
pub use domain::{
    OrchestrationError, RegistryError, StatusChannel, StatusEvent, Trigger, TriggerLimits,
};
pub use generation::{GenerationTemplate, NUM_SAMPLES};
pub use orchestrator::{EpisodePhase, GenerationOrchestrator};
pub use registry::{ModelEntry, ModelRegistry};
pub use sink::NotificationSink;
pub use telemetry::init_tracing;
pub use watcher::{OutputArtifact, OutputWatcher};
pub use wire::{InboundMessage, Reply, WireError};

pub use container_env_manager::{
    ContainerSpec, DockerConfig, DockerEnvironment, EnvError, EnvironmentController, VolumeMount,
};

/// Musika core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use container_env_manager::{ContainerSpec, VolumeMount};

use crate::domain::TriggerLimits;
use crate::generation::GenerationTemplate;

/// Everything an orchestrator needs besides its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Environment to (re)create for every episode.
    pub environment: ContainerSpec,
    /// Host-side directory polled for artifacts.
    pub output_dir: PathBuf,
    /// Artifact file extension.
    pub artifact_extension: String,
    pub template: GenerationTemplate,
    pub limits: TriggerLimits,
    /// Pause after a successful exec before the output directory is read.
    pub settle_delay: Duration,
    /// Upper bound on one generation run; `None` waits forever.
    pub exec_timeout: Option<Duration>,
    /// Stop the environment after every episode instead of keeping it warm.
    pub stop_after_episode: bool,
}

impl OrchestratorConfig {
    /// Defaults for a container that mounts `output_dir` at the template's
    /// save path.
    pub fn new(container: &str, image: &str, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let template = GenerationTemplate::default();
        let environment = ContainerSpec::new(container, image)
            .with_mount(VolumeMount::new(output_dir.clone(), template.save_path.clone()));

        OrchestratorConfig {
            environment,
            output_dir,
            artifact_extension: "wav".to_string(),
            template,
            limits: TriggerLimits::default(),
            settle_delay: Duration::from_secs(2),
            exec_timeout: Some(Duration::from_secs(900)),
            stop_after_episode: true,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_exec_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn with_limits(mut self, limits: TriggerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn keep_warm(mut self, keep_warm: bool) -> Self {
        self.stop_after_episode = !keep_warm;
        self
    }

    /// Name every lifecycle call is keyed on.
    pub fn environment_name(&self) -> &str {
        &self.environment.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_is_mounted_at_save_path() {
        let config = OrchestratorConfig::new("musika-container", "img", "/home/me/musika_outputs");
        assert_eq!(config.environment.mounts.len(), 1);
        assert_eq!(
            config.environment.mounts[0].to_arg(),
            "/home/me/musika_outputs:/output"
        );
        assert_eq!(config.environment_name(), "musika-container");
        assert!(config.stop_after_episode);
    }

    #[test]
    fn test_keep_warm_disables_stop() {
        let config = OrchestratorConfig::new("c", "i", "/tmp").keep_warm(true);
        assert!(!config.stop_after_episode);
    }
}

//! Daemon configuration: flags with environment variable fallbacks.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use container_env_manager::{ContainerSpec, DockerConfig, VolumeMount};
use musika_core::{GenerationTemplate, ModelRegistry, OrchestratorConfig, TriggerLimits};

use crate::listener::ListenerConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "musikad")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "OSC trigger daemon for containerised Musika generation", long_about = None)]
pub struct DaemonArgs {
    /// Address to bind the inbound OSC socket on
    #[arg(long, env = "MUSIKA_LISTEN_ADDR", default_value = "0.0.0.0")]
    pub listen_addr: IpAddr,

    /// Inbound OSC port
    #[arg(long, env = "OSC_LISTEN_PORT", default_value_t = 5005)]
    pub listen_port: u16,

    /// Host that receives /status and /musika_done
    #[arg(long, env = "OSC_REPLY_HOST", default_value = "127.0.0.1")]
    pub reply_host: String,

    /// Port that receives /status and /musika_done
    #[arg(long, env = "OSC_PORT", default_value_t = 7400)]
    pub reply_port: u16,

    /// Container runtime CLI
    #[arg(long, env = "MUSIKA_RUNTIME", default_value = "docker")]
    pub runtime: String,

    /// Container name
    #[arg(long, env = "MUSIKA_CONTAINER", default_value = "musika-container")]
    pub container: String,

    /// Image to start the container from
    #[arg(long, env = "MUSIKA_IMAGE", default_value = "plurdist/musika:latest")]
    pub image: String,

    /// Host directory mounted into the container and polled for output
    /// (default: ~/musika_outputs)
    #[arg(long, env = "MUSIKA_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Mount point of the output directory inside the container
    #[arg(long, env = "MUSIKA_CONTAINER_OUTPUT_DIR", default_value = "/output")]
    pub container_output_dir: String,

    /// GPU request for `--gpus`; empty to run without GPUs
    #[arg(long, env = "MUSIKA_GPUS", default_value = "all")]
    pub gpus: String,

    /// JSON file mapping model selectors to checkpoint paths
    #[arg(long, env = "MUSIKA_MODELS")]
    pub models: Option<PathBuf>,

    /// Keep the container running between triggers
    #[arg(long, env = "MUSIKA_KEEP_WARM")]
    pub keep_warm: bool,

    /// Generation time limit in seconds (0 disables)
    #[arg(long, env = "MUSIKA_EXEC_TIMEOUT_SECS", default_value_t = 900)]
    pub exec_timeout_secs: u64,

    /// Wait after generation before looking for the output file
    #[arg(long, env = "MUSIKA_SETTLE_MS", default_value_t = 2000)]
    pub settle_ms: u64,

    /// Wait after starting the container before using it
    #[arg(long, env = "MUSIKA_STARTUP_GRACE_MS", default_value_t = 2000)]
    pub startup_grace_ms: u64,

    /// Largest accepted truncation value
    #[arg(long, env = "MUSIKA_MAX_TRUNCATION", default_value_t = 4.0)]
    pub max_truncation: f32,

    /// Largest accepted duration in seconds
    #[arg(long, env = "MUSIKA_MAX_SECONDS", default_value_t = 600.0)]
    pub max_seconds: f32,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,
}

impl DaemonArgs {
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join("musika_outputs"))
                .unwrap_or_else(|| PathBuf::from("musika_outputs"))
        })
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            bind: SocketAddr::new(self.listen_addr, self.listen_port),
        }
    }

    pub fn docker_config(&self) -> DockerConfig {
        DockerConfig::new(&self.runtime)
            .with_startup_grace(Duration::from_millis(self.startup_grace_ms))
    }

    pub fn registry(&self) -> Result<ModelRegistry> {
        match &self.models {
            Some(path) => ModelRegistry::load(path)
                .with_context(|| format!("loading model table {}", path.display())),
            None => Ok(ModelRegistry::builtin()),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let output_dir = self.output_dir();
        let template = GenerationTemplate::default().with_save_path(&self.container_output_dir);

        let mut environment = ContainerSpec::new(&self.container, &self.image).with_mount(
            VolumeMount::new(output_dir.clone(), self.container_output_dir.clone()),
        );
        if !self.gpus.trim().is_empty() {
            environment = environment.with_gpus(self.gpus.trim());
        }

        let exec_timeout =
            (self.exec_timeout_secs > 0).then(|| Duration::from_secs(self.exec_timeout_secs));

        OrchestratorConfig {
            environment,
            template,
            ..OrchestratorConfig::new(&self.container, &self.image, output_dir)
        }
        .with_settle_delay(Duration::from_millis(self.settle_ms))
        .with_exec_timeout(exec_timeout)
        .with_limits(TriggerLimits {
            max_truncation: self.max_truncation,
            max_seconds: self.max_seconds,
        })
        .keep_warm(self.keep_warm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> DaemonArgs {
        let mut argv = vec!["musikad"];
        argv.extend_from_slice(args);
        DaemonArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_explicit_flags_build_configs() {
        let args = parse(&[
            "--listen-port",
            "6000",
            "--output-dir",
            "/srv/out",
            "--gpus",
            "",
            "--keep-warm",
            "--exec-timeout-secs",
            "0",
        ]);
        assert_eq!(args.listener_config().bind.port(), 6000);

        let config = args.orchestrator_config();
        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.environment.mounts[0].to_arg(), "/srv/out:/output");
        assert_eq!(config.environment.gpus, None);
        assert!(!config.stop_after_episode);
        assert_eq!(config.exec_timeout, None);
    }

    #[test]
    fn test_container_output_dir_flows_to_template_and_mount() {
        let args = parse(&["--output-dir", "/o", "--container-output-dir", "/mnt/gen"]);
        let config = args.orchestrator_config();
        assert_eq!(config.template.save_path, "/mnt/gen");
        assert_eq!(config.environment.mounts.len(), 1);
        assert_eq!(config.environment.mounts[0].container_path, "/mnt/gen");
        assert_eq!(config.environment.gpus.as_deref(), Some("all"));
    }

    #[test]
    fn test_limits_and_delays() {
        let args = parse(&[
            "--output-dir",
            "/o",
            "--max-truncation",
            "1",
            "--settle-ms",
            "0",
            "--startup-grace-ms",
            "250",
        ]);
        let config = args.orchestrator_config();
        assert_eq!(config.limits.max_truncation, 1.0);
        assert!(config.settle_delay.is_zero());
        assert_eq!(args.docker_config().startup_grace, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_model_table_is_an_error() {
        let args = parse(&["--models", "/definitely/not/here.json"]);
        assert!(args.registry().is_err());
    }
}

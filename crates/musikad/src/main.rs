//! musikad - OSC trigger daemon for containerised Musika generation
//!
//! Listens for `/trigger_musika (truncation, seconds, model)` and replies on
//! `/status` and `/musika_done`. Runs until interrupted.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use container_env_manager::{is_runtime_available, DockerEnvironment};
use musika_core::{init_tracing, GenerationOrchestrator};
use musikad::{DaemonArgs, TriggerListener, UdpNotificationSink};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = DaemonArgs::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(args.json, level);

    let registry = args.registry()?;
    let config = args.orchestrator_config();

    if !is_runtime_available(&args.runtime) {
        warn!(runtime = %args.runtime, "container runtime not found, triggers will fail to start");
    }
    if !config.output_dir.is_dir() {
        warn!(output_dir = %config.output_dir.display(), "output directory does not exist yet");
    }

    let environment = Arc::new(DockerEnvironment::new(args.docker_config()));
    let sink = Arc::new(UdpNotificationSink::connect(&args.reply_host, args.reply_port).await?);
    info!(
        version = musika_core::VERSION,
        reply_to = %sink.target(),
        container = %config.environment.name,
        output_dir = %config.output_dir.display(),
        models = registry.len(),
        keep_warm = !config.stop_after_episode,
        "musikad starting"
    );

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        config,
        registry,
        environment,
        sink.clone(),
    ));
    let listener = TriggerListener::bind(&args.listener_config(), orchestrator, sink).await?;
    info!(listen = %listener.local_addr()?, "listening for OSC triggers");

    listener
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "could not install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        })
        .await
}

//! Inbound OSC endpoint.
//!
//! The receive loop never waits on an episode: every trigger is handed to
//! its own task and the orchestrator decides whether it runs or is turned
//! away as busy. Pings are answered inline with the current phase.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use musika_core::wire::{self, InboundMessage, WireError};
use musika_core::{GenerationOrchestrator, NotificationSink, StatusEvent};
use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Where the listener binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    pub bind: SocketAddr,
}

pub struct TriggerListener {
    socket: UdpSocket,
    orchestrator: Arc<GenerationOrchestrator>,
    sink: Arc<dyn NotificationSink>,
}

impl TriggerListener {
    /// Bind the inbound socket. Failure here is fatal for the daemon.
    pub async fn bind(
        config: &ListenerConfig,
        orchestrator: Arc<GenerationOrchestrator>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(config.bind)
            .await
            .with_context(|| format!("binding OSC listener on {}", config.bind))?;
        Ok(TriggerListener {
            socket,
            orchestrator,
            sink,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive and dispatch until `shutdown` resolves, then wait for
    /// in-flight episodes to finish.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let mut buf = vec![0u8; wire::MAX_DATAGRAM];
        let mut episodes = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting triggers");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => self.dispatch(&buf[..len], peer, &mut episodes).await,
                    // e.g. ICMP port-unreachable surfacing as ECONNRESET on some platforms
                    Err(err) => warn!(error = %err, "receive failed"),
                },
                Some(joined) = episodes.join_next(), if !episodes.is_empty() => {
                    if let Err(err) = joined {
                        warn!(error = %err, "episode task failed");
                    }
                }
            }
        }

        if !episodes.is_empty() {
            info!(in_flight = episodes.len(), "waiting for in-flight episodes");
        }
        while let Some(joined) = episodes.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "episode task failed");
            }
        }
        Ok(())
    }

    async fn dispatch(&self, datagram: &[u8], peer: SocketAddr, episodes: &mut JoinSet<()>) {
        let messages = match wire::decode_datagram(datagram) {
            Ok(messages) => messages,
            Err(err) => {
                warn!(event = "listener.decode_failed", peer = %peer, error = %err);
                return;
            }
        };

        for msg in messages {
            match wire::parse_inbound(&msg) {
                Ok(InboundMessage::Trigger(trigger)) => {
                    info!(
                        peer = %peer,
                        selector = %trigger.model_selector,
                        seconds = trigger.duration_seconds,
                        truncation = trigger.truncation,
                        "trigger received"
                    );
                    let orchestrator = self.orchestrator.clone();
                    episodes.spawn(async move {
                        // Outcome is already reported through the sink.
                        let _ = orchestrator.handle(trigger).await;
                    });
                }
                Ok(InboundMessage::Ping) => self.reply_phase(peer).await,
                Err(err @ WireError::BadArguments { .. }) => {
                    warn!(event = "listener.decode_failed", peer = %peer, error = %err);
                    self.sink
                        .notify(StatusEvent::error(format!("Invalid trigger: {err}")))
                        .await;
                }
                Err(err) => {
                    debug!(event = "listener.decode_failed", peer = %peer, error = %err, "ignoring message");
                }
            }
        }
    }

    async fn reply_phase(&self, peer: SocketAddr) {
        let phase = self.orchestrator.phase();
        let bytes = match wire::encode(wire::status_message(phase.as_str())) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "could not encode ping reply");
                return;
            }
        };
        if let Err(err) = self.socket.send_to(&bytes, peer).await {
            warn!(peer = %peer, error = %err, "ping reply failed");
        }
    }
}

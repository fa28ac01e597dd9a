//! OSC-over-UDP notification sink.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use musika_core::{wire, NotificationSink, StatusEvent};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Sends every [`StatusEvent`] as one OSC datagram to a fixed target.
pub struct UdpNotificationSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpNotificationSink {
    /// Resolve `host:port` and bind an ephemeral local socket for sending.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let target = tokio::net::lookup_host((host, port))
            .await
            .with_context(|| format!("resolving reply host {host}:{port}"))?
            .next()
            .with_context(|| format!("reply host {host} has no addresses"))?;

        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .context("binding notification socket")?;
        Ok(UdpNotificationSink { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl NotificationSink for UdpNotificationSink {
    async fn notify(&self, event: StatusEvent) {
        let bytes = match wire::encode(wire::event_message(&event)) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(event = "notify.send_failed", error = %err, "could not encode status");
                return;
            }
        };

        match self.socket.send_to(&bytes, self.target).await {
            Ok(_) => debug!(target_addr = %self.target, status = %event, "sent"),
            Err(err) => warn!(
                event = "notify.send_failed",
                target_addr = %self.target,
                error = %err,
                "status delivery failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use musika_core::wire::Reply;
    use std::time::Duration;

    #[tokio::test]
    async fn test_events_arrive_as_osc() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let sink = UdpNotificationSink::connect("127.0.0.1", port).await.unwrap();

        sink.notify(StatusEvent::status("starting")).await;
        sink.notify(StatusEvent::result("/out/a.wav")).await;

        let mut buf = [0u8; wire::MAX_DATAGRAM];
        let mut replies = Vec::new();
        for _ in 0..2 {
            let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            let msgs = wire::decode_datagram(&buf[..n]).unwrap();
            replies.push(wire::parse_reply(&msgs[0]).unwrap());
        }
        assert_eq!(
            replies,
            vec![
                Reply::Status("starting".into()),
                Reply::Done("/out/a.wav".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_target_does_not_panic() {
        // Nothing listens here; delivery is fire-and-forget.
        let sink = UdpNotificationSink::connect("127.0.0.1", 9).await.unwrap();
        sink.notify(StatusEvent::error("busy")).await;
    }
}

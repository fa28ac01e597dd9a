//! musikactl - command-line client for musikad
//!
//! ## Commands
//!
//! - `trigger`: Send `/trigger_musika` and optionally wait for the result
//! - `ping`: Ask the daemon which phase it is in
//! - `models`: List the selectors a model table provides

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use musika_core::wire::{self, Reply};
use musika_core::{init_tracing, ModelRegistry, Trigger};
use rosc::OscMessage;
use serde_json::json;
use tokio::net::UdpSocket;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "musikactl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send triggers to a running musikad", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print replies as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Daemon host
    #[arg(long, global = true, env = "MUSIKA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Daemon OSC port
    #[arg(long, global = true, env = "OSC_LISTEN_PORT", default_value_t = 5005)]
    port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a generation
    Trigger {
        /// Model selector
        #[arg(short, long, default_value = "techno")]
        model: String,

        /// Length of the generated audio in seconds
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f32,

        /// Sampling truncation
        #[arg(short, long, default_value_t = 0.5)]
        truncation: f32,

        /// Listen for /status and /musika_done until the episode ends
        #[arg(short, long)]
        wait: bool,

        /// Local port the daemon replies to
        #[arg(long, env = "OSC_PORT", default_value_t = 7400)]
        reply_port: u16,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 960)]
        timeout_secs: u64,
    },

    /// Ask the daemon for its current phase
    Ping {
        /// Give up after this many seconds
        #[arg(long, default_value_t = 3)]
        timeout_secs: u64,
    },

    /// List model selectors
    Models {
        /// JSON model table (default: built-in table)
        #[arg(long, env = "MUSIKA_MODELS")]
        models: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(false, level);

    match cli.command {
        Commands::Trigger {
            model,
            seconds,
            truncation,
            wait,
            reply_port,
            timeout_secs,
        } => {
            let daemon = resolve(&cli.host, cli.port).await?;
            let trigger = Trigger::new(model, truncation, seconds);
            let wait = wait.then(|| (reply_port, Duration::from_secs(timeout_secs)));
            cmd_trigger(daemon, &trigger, wait, cli.json).await
        }
        Commands::Ping { timeout_secs } => {
            let daemon = resolve(&cli.host, cli.port).await?;
            cmd_ping(daemon, Duration::from_secs(timeout_secs), cli.json).await
        }
        Commands::Models { models } => cmd_models(models.as_deref(), cli.json),
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("resolving {host}:{port}"))?
        .next()
        .with_context(|| format!("no address for {host}:{port}"))
}

fn unspecified_for(addr: &SocketAddr) -> SocketAddr {
    if addr.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    }
}

async fn send_to(socket: &UdpSocket, daemon: SocketAddr, msg: OscMessage) -> Result<()> {
    let bytes = wire::encode(msg)?;
    socket
        .send_to(&bytes, daemon)
        .await
        .with_context(|| format!("sending to {daemon}"))?;
    Ok(())
}

async fn recv_reply(socket: &UdpSocket) -> Result<Reply> {
    let mut buf = vec![0u8; wire::MAX_DATAGRAM];
    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;
        let messages = match wire::decode_datagram(&buf[..len]) {
            Ok(messages) => messages,
            Err(err) => {
                debug!(peer = %peer, error = %err, "ignoring undecodable datagram");
                continue;
            }
        };
        if let Some(reply) = messages.iter().find_map(wire::parse_reply) {
            return Ok(reply);
        }
    }
}

/// Read replies until a terminal one arrives or `limit` runs out.
async fn collect_until_terminal(
    socket: &UdpSocket,
    limit: Duration,
    mut on_reply: impl FnMut(&Reply),
) -> Result<Reply> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let reply = tokio::time::timeout_at(deadline, recv_reply(socket))
            .await
            .context("timed out waiting for the daemon")??;
        on_reply(&reply);
        if reply.is_terminal() {
            return Ok(reply);
        }
    }
}

fn render(reply: &Reply, as_json: bool) -> String {
    let (address, value) = match reply {
        Reply::Status(text) => (wire::STATUS_ADDR, text),
        Reply::Done(path) => (wire::DONE_ADDR, path),
    };
    if as_json {
        json!({ "address": address, "value": value }).to_string()
    } else {
        format!("{address} {value}")
    }
}

/// Terminal reply to process outcome: the artifact path, or the daemon's error.
fn outcome(reply: &Reply) -> Result<String> {
    match reply {
        Reply::Done(path) => Ok(path.clone()),
        Reply::Status(text) => match text.strip_prefix(wire::ERROR_PREFIX) {
            Some(reason) => bail!("daemon reported: {reason}"),
            None => bail!("unexpected final status: {text}"),
        },
    }
}

async fn cmd_trigger(
    daemon: SocketAddr,
    trigger: &Trigger,
    wait: Option<(u16, Duration)>,
    as_json: bool,
) -> Result<()> {
    // Replies go to the daemon's configured port, so bind it before sending.
    let replies = match wait {
        Some((reply_port, _)) => Some(
            UdpSocket::bind(SocketAddr::new(unspecified_for(&daemon).ip(), reply_port))
                .await
                .with_context(|| format!("binding reply port {reply_port}"))?,
        ),
        None => None,
    };

    let socket = UdpSocket::bind(unspecified_for(&daemon)).await?;
    send_to(&socket, daemon, wire::trigger_message(trigger)).await?;
    debug!(%daemon, model = %trigger.model_selector, "trigger sent");

    let (Some(replies), Some((_, limit))) = (replies, wait) else {
        println!(
            "Sent {} model={} seconds={} truncation={} to {}",
            wire::TRIGGER_ADDR,
            trigger.model_selector,
            trigger.duration_seconds,
            trigger.truncation,
            daemon
        );
        return Ok(());
    };

    let last = collect_until_terminal(&replies, limit, |reply| {
        println!("{}", render(reply, as_json));
    })
    .await?;
    outcome(&last).map(|_| ())
}

async fn cmd_ping(daemon: SocketAddr, limit: Duration, as_json: bool) -> Result<()> {
    let socket = UdpSocket::bind(unspecified_for(&daemon)).await?;
    send_to(&socket, daemon, wire::ping_message()).await?;

    let reply = tokio::time::timeout(limit, recv_reply(&socket))
        .await
        .with_context(|| format!("no answer from {daemon}"))??;
    match reply {
        Reply::Status(phase) if as_json => {
            println!("{}", json!({ "daemon": daemon.to_string(), "phase": phase }))
        }
        Reply::Status(phase) => println!("{daemon}: {phase}"),
        other => bail!("unexpected ping reply: {other:?}"),
    }
    Ok(())
}

fn cmd_models(path: Option<&Path>, as_json: bool) -> Result<()> {
    let registry = match path {
        Some(path) => ModelRegistry::load(path)
            .with_context(|| format!("loading model table {}", path.display()))?,
        None => ModelRegistry::builtin(),
    };

    if as_json {
        let entries: Vec<_> = registry.entries().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let width = registry
        .entries()
        .map(|e| e.selector.len())
        .max()
        .unwrap_or(0);
    for entry in registry.entries() {
        println!("{:width$}  {}", entry.selector, entry.load_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn local_socket() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn send_reply(to: SocketAddr, msg: OscMessage) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .send_to(&wire::encode(msg).unwrap(), to)
            .await
            .unwrap();
    }

    #[test]
    fn test_outcome_done_is_success() {
        let path = outcome(&Reply::Done("/home/u/musika_outputs/a.wav".into())).unwrap();
        assert_eq!(path, "/home/u/musika_outputs/a.wav");
    }

    #[test]
    fn test_outcome_error_status_fails() {
        let err = outcome(&Reply::Status("Error: Model 'x' not found".into())).unwrap_err();
        assert_eq!(err.to_string(), "daemon reported: Model 'x' not found");
    }

    #[test]
    fn test_render_plain_and_json() {
        let reply = Reply::Status("starting".into());
        assert_eq!(render(&reply, false), "/status starting");

        let value: serde_json::Value =
            serde_json::from_str(&render(&Reply::Done("/o/a.wav".into()), true)).unwrap();
        assert_eq!(value["address"], "/musika_done");
        assert_eq!(value["value"], "/o/a.wav");
    }

    #[tokio::test]
    async fn test_collect_stops_at_done() {
        let (socket, addr) = local_socket().await;
        send_reply(addr, wire::status_message("starting")).await;
        send_reply(addr, wire::status_message("complete")).await;
        send_reply(
            addr,
            OscMessage {
                addr: wire::DONE_ADDR.to_string(),
                args: vec![rosc::OscType::String("/o/a.wav".into())],
            },
        )
        .await;

        let mut seen = Vec::new();
        let last = collect_until_terminal(&socket, Duration::from_secs(5), |r| {
            seen.push(r.clone())
        })
        .await
        .unwrap();

        assert_eq!(last, Reply::Done("/o/a.wav".into()));
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], Reply::Status("starting".into()));
    }

    #[tokio::test]
    async fn test_collect_stops_at_error() {
        let (socket, addr) = local_socket().await;
        send_reply(addr, wire::status_message("Error: busy")).await;

        let last = collect_until_terminal(&socket, Duration::from_secs(5), |_| {})
            .await
            .unwrap();
        assert!(outcome(&last).is_err());
    }

    #[tokio::test]
    async fn test_collect_times_out() {
        let (socket, _) = local_socket().await;
        let err = collect_until_terminal(&socket, Duration::from_millis(50), |_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_recv_skips_garbage() {
        let (socket, addr) = local_socket().await;
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"not osc", addr).await.unwrap();
        send_reply(addr, wire::status_message("idle")).await;

        let reply = recv_reply(&socket).await.unwrap();
        assert_eq!(reply, Reply::Status("idle".into()));
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let (daemon, daemon_addr) = local_socket().await;
        let fake_daemon = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (len, peer) = daemon.recv_from(&mut buf).await.unwrap();
            let msgs = wire::decode_datagram(&buf[..len]).unwrap();
            assert_eq!(msgs[0].addr, wire::PING_ADDR);
            let bytes = wire::encode(wire::status_message("idle")).unwrap();
            daemon.send_to(&bytes, peer).await.unwrap();
        });

        cmd_ping(daemon_addr, Duration::from_secs(5), false)
            .await
            .unwrap();
        fake_daemon.await.unwrap();
    }

    #[tokio::test]
    async fn test_trigger_without_wait_sends_message() {
        let (daemon, daemon_addr) = local_socket().await;
        cmd_trigger(daemon_addr, &Trigger::new("misc", 1.0, 30.0), None, false)
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        let (len, _) = daemon.recv_from(&mut buf).await.unwrap();
        let msgs = wire::decode_datagram(&buf[..len]).unwrap();
        match wire::parse_inbound(&msgs[0]).unwrap() {
            musika_core::InboundMessage::Trigger(t) => {
                assert_eq!(t.model_selector, "misc");
                assert_eq!(t.duration_seconds, 30.0);
            }
            other => panic!("expected trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_models_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        std::fs::write(&path, r#"{"ambient": "checkpoints/ambient"}"#).unwrap();
        assert!(cmd_models(Some(&path), true).is_ok());
        assert!(cmd_models(Some(&dir.path().join("missing.json")), false).is_err());
    }
}

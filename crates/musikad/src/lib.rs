//! musikad: the OSC trigger daemon
//!
//! Binds a UDP endpoint, turns `/trigger_musika` messages into episodes on a
//! [`GenerationOrchestrator`](musika_core::GenerationOrchestrator) and sends
//! status back over OSC.

pub mod config;
pub mod listener;
pub mod notify;

pub use config::DaemonArgs;
pub use listener::{ListenerConfig, TriggerListener};
pub use notify::UdpNotificationSink;

//! Domain types shared by the orchestrator, the wire codec and the daemon.

pub mod error;
pub mod status;
pub mod trigger;

pub use error::{OrchestrationError, RegistryError};
pub use status::{StatusChannel, StatusEvent};
pub use trigger::{Trigger, TriggerLimits};

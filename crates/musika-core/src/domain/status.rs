//! Outbound status notifications.

use serde::{Deserialize, Serialize};

/// Payload sent when the environment is being prepared.
pub const STATUS_STARTING: &str = "starting";
/// Payload sent right before the result path.
pub const STATUS_COMPLETE: &str = "complete";

/// Which stream a [`StatusEvent`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusChannel {
    /// Progress.
    Status,
    /// Final artifact path.
    Result,
    /// Terminal failure.
    Error,
}

impl std::fmt::Display for StatusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusChannel::Status => write!(f, "status"),
            StatusChannel::Result => write!(f, "result"),
            StatusChannel::Error => write!(f, "error"),
        }
    }
}

/// Fire-and-forget notification for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub channel: StatusChannel,
    pub payload: String,
}

impl StatusEvent {
    pub fn status(payload: impl Into<String>) -> Self {
        StatusEvent {
            channel: StatusChannel::Status,
            payload: payload.into(),
        }
    }

    pub fn result(payload: impl Into<String>) -> Self {
        StatusEvent {
            channel: StatusChannel::Result,
            payload: payload.into(),
        }
    }

    pub fn error(payload: impl Into<String>) -> Self {
        StatusEvent {
            channel: StatusChannel::Error,
            payload: payload.into(),
        }
    }

    /// Result and error events end an episode; status events do not.
    pub fn is_terminal(&self) -> bool {
        self.channel != StatusChannel::Status
    }
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.channel, self.payload)
    }
}

//! Outbound reporting seam.

use async_trait::async_trait;

use crate::domain::StatusEvent;

/// Delivers [`StatusEvent`]s to the caller.
///
/// Delivery is fire-and-forget: implementations log failures and never
/// retry, so `notify` has nothing to return.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: StatusEvent);
}

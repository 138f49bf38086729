use crate::error::Result;
use crate::notification::Notification;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A coarse-grained row change on the notifications table. Carries no row
/// data beyond the id; consumers refetch the active set rather than diffing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub id: i64,
}

/// Discard queued change events so a burst collapses into the single refresh
/// the caller is about to perform. Lag (the receiver falling behind the
/// channel) is treated the same way: whatever was missed, one refetch covers
/// it.
pub fn drain_pending(rx: &mut broadcast::Receiver<ChangeEvent>) {
    loop {
        match rx.try_recv() {
            Ok(_) => continue,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

/// The remote-store surface the feed consumes: a query for the active set and
/// a change subscription. Unsubscribing is dropping the receiver. Admin
/// writes are not part of this boundary.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// All rows with `status == active`, ordered by `created_at` descending.
    async fn fetch_active(&self) -> Result<Vec<Notification>>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

use crate::feed::FeedSnapshot;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Full feed snapshot. Pushed on connect, after every coalesced refresh,
    /// and after any acknowledgement.
    Feed(FeedSnapshot),
    /// A refresh failed; the accompanying snapshot is the retained one.
    /// Intended for a transient notice, not a hard failure.
    SyncLost(SyncLostPayload),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncLostPayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorPayload {
    pub message: String,
}

// Client-to-server messages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    MarkRead { id: i64 },
    MarkAllRead,
    Refresh,
}

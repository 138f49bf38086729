use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Out-of-band signals delivered to a user's live feed session.
#[derive(Debug, Clone, Copy)]
pub enum SessionSignal {
    /// Another surface (REST) changed this user's read state; the session
    /// should reload it and push a fresh snapshot.
    ReadStateChanged,
}

pub type SignalSender = mpsc::UnboundedSender<SessionSignal>;

/// Registry of live feed sessions, keyed by user. A user opening a second
/// session replaces the first as the signal target.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, SignalSender>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn register(&self, user_id: Uuid, sender: SignalSender) {
        self.sessions.insert(user_id, sender);
        tracing::info!(
            "Live feed session opened for user {} ({} active)",
            user_id,
            self.sessions.len()
        );
    }

    /// Remove the session, but only if it is still the registered one; a
    /// replacement session registered in the meantime stays.
    pub fn unregister(&self, user_id: &Uuid, sender: &SignalSender) {
        self.sessions
            .remove_if(user_id, |_, registered| registered.same_channel(sender));
        tracing::info!("Live feed session closed for user {}", user_id);
    }

    /// Signal a user's live session, if one exists.
    pub fn notify(&self, user_id: &Uuid, signal: SessionSignal) -> bool {
        if let Some(sender) = self.sessions.get(user_id) {
            sender.send(signal).is_ok()
        } else {
            false
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

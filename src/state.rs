use crate::notification::NotificationRepository;
use crate::readstate::ReadStateStore;
use crate::websocket::SessionRegistry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub notifications: Arc<NotificationRepository>,
    pub read_store: ReadStateStore,
    pub sessions: SessionRegistry,
}

#[derive(Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub read_state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            jwt_secret: std::env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            read_state_dir: std::env::var("READ_STATE_DIR")
                .unwrap_or_else(|_| "data/readstate".to_string())
                .into(),
        }
    }
}

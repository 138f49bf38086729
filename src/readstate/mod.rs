use crate::error::Result;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Per-user durable record of acknowledged notification ids.
///
/// One JSON file per user under the configured directory, named
/// `readNotifications_<userId>.json` and holding a plain id array. The set is
/// local to this machine and survives restarts; it is never pruned when
/// notifications later go inactive or are deleted, so acknowledgements hold
/// across a notification's whole lifecycle.
#[derive(Clone)]
pub struct ReadStateStore {
    dir: PathBuf,
}

impl ReadStateStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, user_id: Uuid) -> PathBuf {
        self.dir.join(format!("readNotifications_{}.json", user_id))
    }

    /// Load the acknowledged set for a user.
    ///
    /// Missing, unreadable, or corrupt state loads as the empty set: the worst
    /// outcome of losing read state is that everything shows as unread again,
    /// which is always preferable to failing the feed.
    pub fn load(&self, user_id: Uuid) -> HashSet<i64> {
        let path = self.path_for(user_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashSet::new(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return HashSet::new();
            }
        };

        match serde_json::from_str::<Vec<i64>>(&raw) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!("Discarding corrupt read state at {}: {}", path.display(), e);
                HashSet::new()
            }
        }
    }

    /// Overwrite the stored set for a user in a single replace.
    ///
    /// Writes a temporary sibling and renames it over the target so a crash
    /// mid-write leaves either the old file or the new one, never a torn one.
    pub fn save(&self, user_id: Uuid, ids: &HashSet<i64>) -> Result<()> {
        let mut sorted: Vec<i64> = ids.iter().copied().collect();
        sorted.sort_unstable();
        let raw = serde_json::to_string(&sorted)?;

        let path = self.path_for(user_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw.as_bytes())?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

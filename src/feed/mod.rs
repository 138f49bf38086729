pub mod source;

pub use source::{drain_pending, ChangeEvent, ChangeOp, NotificationSource};

use crate::error::Result;
use crate::notification::{Notification, Viewer};
use crate::readstate::ReadStateStore;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use utoipa::ToSchema;

/// Whether the held list reflects the last fetch or a retained older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// List reflects the last successful fetch.
    Synced,
    /// Last fetch failed (or none has completed yet); the previously held
    /// snapshot is still being shown.
    Stale,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FeedItem {
    #[serde(flatten)]
    pub notification: Notification,
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FeedSnapshot {
    pub notifications: Vec<FeedItem>,
    pub unread_count: usize,
    pub sync: SyncState,
}

/// One user's merged view of the notification table: the rows currently
/// visible to them, joined with the locally persisted set of acknowledged
/// ids. Kept current by calling [`refresh`](Self::refresh) whenever the
/// source signals a change.
pub struct NotificationFeed {
    source: Arc<dyn NotificationSource>,
    read_store: ReadStateStore,
    viewer: Viewer,
    visible: Vec<Notification>,
    read_ids: HashSet<i64>,
    sync: SyncState,
}

impl NotificationFeed {
    /// Starts `Stale` with an empty list; the read set is loaded eagerly so
    /// acknowledgements work even before the first successful fetch.
    pub fn new(
        source: Arc<dyn NotificationSource>,
        read_store: ReadStateStore,
        viewer: Viewer,
    ) -> Self {
        let read_ids = read_store.load(viewer.user_id);
        Self {
            source,
            read_store,
            viewer,
            visible: Vec::new(),
            read_ids,
            sync: SyncState::Stale,
        }
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.visible
    }

    pub fn is_read(&self, id: i64) -> bool {
        self.read_ids.contains(&id)
    }

    pub fn unread_count(&self) -> usize {
        self.visible
            .iter()
            .filter(|n| !self.read_ids.contains(&n.id))
            .count()
    }

    /// Refetch the active set and rebuild the visible list.
    ///
    /// On failure the previous list is retained and the state flips to
    /// `Stale`; the error is returned so the caller can surface a transient
    /// notice, but nothing here is fatal.
    pub async fn refresh(&mut self) -> Result<()> {
        match self.source.fetch_active().await {
            Ok(rows) => {
                let now = Utc::now();
                self.visible = rows
                    .into_iter()
                    .filter(|n| n.is_visible_to(&self.viewer, now))
                    .collect();
                self.sync = SyncState::Synced;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    "Notification fetch failed for user {}, keeping {} stale entries: {}",
                    self.viewer.user_id,
                    self.visible.len(),
                    e
                );
                self.sync = SyncState::Stale;
                Err(e)
            }
        }
    }

    /// Acknowledge one notification. Idempotent; an already-read id does not
    /// rewrite the file. No remote round trip is involved.
    pub fn mark_read(&mut self, id: i64) -> Result<()> {
        if self.read_ids.insert(id) {
            self.read_store.save(self.viewer.user_id, &self.read_ids)?;
        }
        Ok(())
    }

    /// Acknowledge every currently visible notification in one write.
    pub fn mark_all_read(&mut self) -> Result<()> {
        let mut changed = false;
        for n in &self.visible {
            changed |= self.read_ids.insert(n.id);
        }
        if changed {
            self.read_store.save(self.viewer.user_id, &self.read_ids)?;
        }
        Ok(())
    }

    /// Re-read the persisted set. Used when another surface of this process
    /// acknowledged ids on this user's behalf.
    pub fn reload_read_state(&mut self) {
        self.read_ids = self.read_store.load(self.viewer.user_id);
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            notifications: self
                .visible
                .iter()
                .map(|n| FeedItem {
                    notification: n.clone(),
                    is_read: self.read_ids.contains(&n.id),
                })
                .collect(),
            unread_count: self.unread_count(),
            sync: self.sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::notification::{NotificationCategory, NotificationStatus, AUDIENCE_ALL};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    struct FakeSource {
        rows: Mutex<Vec<Notification>>,
        fail: AtomicBool,
        change_tx: broadcast::Sender<ChangeEvent>,
    }

    impl FakeSource {
        fn new(rows: Vec<Notification>) -> Arc<Self> {
            let (change_tx, _) = broadcast::channel(16);
            Arc::new(Self {
                rows: Mutex::new(rows),
                fail: AtomicBool::new(false),
                change_tx,
            })
        }

        fn set_rows(&self, rows: Vec<Notification>) {
            *self.rows.lock().unwrap() = rows;
        }

        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl NotificationSource for FakeSource {
        async fn fetch_active(&self) -> Result<Vec<Notification>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Retrieval(sqlx::Error::PoolClosed));
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|n| n.status == NotificationStatus::Active)
                .cloned()
                .collect())
        }

        fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
            self.change_tx.subscribe()
        }
    }

    fn row(id: i64, audience: &str, status: NotificationStatus) -> Notification {
        row_at(id, audience, status, Utc::now() - Duration::hours(1))
    }

    fn row_at(
        id: i64,
        audience: &str,
        status: NotificationStatus,
        start_date: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id,
            title: format!("announcement {}", id),
            message: "body".to_string(),
            category: NotificationCategory::General,
            audience: audience.to_string(),
            status,
            start_date,
            end_date: None,
            created_at: start_date,
        }
    }

    fn feed_for(source: Arc<FakeSource>, group: &str) -> (tempfile::TempDir, NotificationFeed) {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadStateStore::new(dir.path()).unwrap();
        let viewer = Viewer {
            user_id: Uuid::new_v4(),
            group: group.to_string(),
        };
        (dir, NotificationFeed::new(source, store, viewer))
    }

    #[tokio::test]
    async fn test_initial_state_is_stale_and_empty() {
        let source = FakeSource::new(vec![]);
        let (_dir, feed) = feed_for(source, "CS");
        assert_eq!(feed.sync_state(), SyncState::Stale);
        assert!(feed.notifications().is_empty());
        assert_eq!(feed.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_filters_to_viewer() {
        let source = FakeSource::new(vec![
            row(1, AUDIENCE_ALL, NotificationStatus::Active),
            row(2, "CS", NotificationStatus::Active),
            row(3, "MATH", NotificationStatus::Active),
            row(4, AUDIENCE_ALL, NotificationStatus::Inactive),
        ]);
        let (_dir, mut feed) = feed_for(source, "CS");
        feed.refresh().await.unwrap();

        let ids: Vec<i64> = feed.notifications().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(feed.sync_state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_unread_count_with_empty_read_state_equals_visible() {
        let source = FakeSource::new(vec![
            row(1, AUDIENCE_ALL, NotificationStatus::Active),
            row(2, AUDIENCE_ALL, NotificationStatus::Active),
            row(3, AUDIENCE_ALL, NotificationStatus::Active),
        ]);
        let (_dir, mut feed) = feed_for(source, "CS");
        feed.refresh().await.unwrap();
        assert_eq!(feed.unread_count(), 3);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let source = FakeSource::new(vec![
            row(1, AUDIENCE_ALL, NotificationStatus::Active),
            row(2, AUDIENCE_ALL, NotificationStatus::Active),
        ]);
        let (_dir, mut feed) = feed_for(source, "CS");
        feed.refresh().await.unwrap();

        feed.mark_read(1).unwrap();
        assert_eq!(feed.unread_count(), 1);
        feed.mark_read(1).unwrap();
        assert_eq!(feed.unread_count(), 1);
        assert!(feed.is_read(1));
        assert!(!feed.is_read(2));
    }

    #[tokio::test]
    async fn test_mark_all_read_zeroes_unread_from_any_prior_state() {
        let source = FakeSource::new(vec![
            row(1, AUDIENCE_ALL, NotificationStatus::Active),
            row(2, AUDIENCE_ALL, NotificationStatus::Active),
            row(3, "CS", NotificationStatus::Active),
        ]);
        let (_dir, mut feed) = feed_for(source, "CS");
        feed.refresh().await.unwrap();
        feed.mark_read(2).unwrap();

        feed.mark_all_read().unwrap();
        assert_eq!(feed.unread_count(), 0);

        // And again with nothing left to add.
        feed.mark_all_read().unwrap();
        assert_eq!(feed.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = FakeSource::new(vec![
            row(1, AUDIENCE_ALL, NotificationStatus::Active),
            row(2, AUDIENCE_ALL, NotificationStatus::Active),
            row(3, AUDIENCE_ALL, NotificationStatus::Active),
        ]);
        let (_dir, mut feed) = feed_for(source.clone(), "CS");
        feed.refresh().await.unwrap();
        assert_eq!(feed.notifications().len(), 3);

        source.set_fail(true);
        assert!(feed.refresh().await.is_err());
        assert_eq!(feed.notifications().len(), 3);
        assert_eq!(feed.sync_state(), SyncState::Stale);

        source.set_fail(false);
        feed.refresh().await.unwrap();
        assert_eq!(feed.sync_state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_future_start_date_appears_after_refresh() {
        let future = Utc::now() + Duration::hours(2);
        let source = FakeSource::new(vec![row_at(
            1,
            AUDIENCE_ALL,
            NotificationStatus::Active,
            future,
        )]);
        let (_dir, mut feed) = feed_for(source.clone(), "CS");
        feed.refresh().await.unwrap();
        assert!(feed.notifications().is_empty());

        // Clock passes the start date (simulated by moving the row's window
        // into the past); the next refresh picks it up.
        source.set_rows(vec![row_at(
            1,
            AUDIENCE_ALL,
            NotificationStatus::Active,
            Utc::now() - Duration::hours(1),
        )]);
        feed.refresh().await.unwrap();
        assert_eq!(feed.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_read_state_survives_feed_rebuild() {
        let source = FakeSource::new(vec![
            row(1, AUDIENCE_ALL, NotificationStatus::Active),
            row(2, AUDIENCE_ALL, NotificationStatus::Active),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let store = ReadStateStore::new(dir.path()).unwrap();
        let viewer = Viewer {
            user_id: Uuid::new_v4(),
            group: "CS".to_string(),
        };

        let mut feed = NotificationFeed::new(source.clone(), store.clone(), viewer.clone());
        feed.refresh().await.unwrap();
        feed.mark_read(1).unwrap();
        drop(feed);

        let mut rebuilt = NotificationFeed::new(source, store, viewer);
        rebuilt.refresh().await.unwrap();
        assert_eq!(rebuilt.unread_count(), 1);
        assert!(rebuilt.is_read(1));
    }

    #[tokio::test]
    async fn test_reload_read_state_picks_up_external_write() {
        let source = FakeSource::new(vec![row(1, AUDIENCE_ALL, NotificationStatus::Active)]);
        let dir = tempfile::tempdir().unwrap();
        let store = ReadStateStore::new(dir.path()).unwrap();
        let viewer = Viewer {
            user_id: Uuid::new_v4(),
            group: "CS".to_string(),
        };

        let mut feed = NotificationFeed::new(source, store.clone(), viewer.clone());
        feed.refresh().await.unwrap();
        assert_eq!(feed.unread_count(), 1);

        // Another surface acknowledges on this user's behalf.
        store.save(viewer.user_id, &[1].into_iter().collect()).unwrap();
        feed.reload_read_state();
        assert_eq!(feed.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_flags_read_rows() {
        let source = FakeSource::new(vec![
            row(1, AUDIENCE_ALL, NotificationStatus::Active),
            row(2, AUDIENCE_ALL, NotificationStatus::Active),
        ]);
        let (_dir, mut feed) = feed_for(source, "CS");
        feed.refresh().await.unwrap();
        feed.mark_read(2).unwrap();

        let snapshot = feed.snapshot();
        assert_eq!(snapshot.unread_count, 1);
        assert_eq!(snapshot.sync, SyncState::Synced);
        let read_flags: Vec<(i64, bool)> = snapshot
            .notifications
            .iter()
            .map(|item| (item.notification.id, item.is_read))
            .collect();
        assert_eq!(read_flags, vec![(1, false), (2, true)]);
    }

    #[tokio::test]
    async fn test_change_event_burst_drains_to_single_refresh() {
        let source = FakeSource::new(vec![]);
        let mut rx = source.subscribe();
        for id in 1..=5 {
            source
                .change_tx
                .send(ChangeEvent {
                    op: ChangeOp::Insert,
                    id,
                })
                .unwrap();
        }

        // One recv plus a drain consumes the whole burst: a consumer loop
        // performs a single fetch for it.
        assert!(rx.recv().await.is_ok());
        drain_pending(&mut rx);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}

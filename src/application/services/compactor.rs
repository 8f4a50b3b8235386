//! Periodic task that collapses a room's update log into its snapshot row
//! (spec §4.5). Operates purely through the `Store` port; the hub's
//! in-memory room cache is refreshed lazily on next access and is not
//! touched here.

use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{Store, StoreResult};
use crate::domain::{build_snapshot_blob, split_snapshot_blob};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_UPDATE_THRESHOLD: i64 = 100;
pub const DEFAULT_KEEP_RECENT: i64 = 10;

const ROOM_PAGE_SIZE: i64 = 200;

pub struct Compactor {
    store: Arc<dyn Store>,
    update_threshold: i64,
    keep_recent: i64,
}

impl Compactor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            update_threshold: DEFAULT_UPDATE_THRESHOLD,
            keep_recent: DEFAULT_KEEP_RECENT,
        }
    }

    pub fn with_thresholds(store: Arc<dyn Store>, update_threshold: i64, keep_recent: i64) -> Self {
        Self {
            store,
            update_threshold,
            keep_recent,
        }
    }

    /// One full pass over every room whose update count has crossed the
    /// threshold. Paginates the room listing rather than loading it all at
    /// once, since the store itself may hold an unbounded number of rooms.
    pub async fn run_tick(&self) {
        let mut offset = 0i64;
        loop {
            let rooms = match self.store.list_rooms(ROOM_PAGE_SIZE, offset).await {
                Ok(rooms) => rooms,
                Err(e) => {
                    tracing::error!(error = %e, "compactor_list_rooms_failed");
                    return;
                }
            };
            if rooms.is_empty() {
                break;
            }
            for room in &rooms {
                match self.store.count_updates(&room.id).await {
                    Ok(count) if count >= self.update_threshold => {
                        if let Err(e) = self.compact_room(&room.id).await {
                            tracing::error!(room_id = %room.id, error = %e, "compact_room_failed");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(room_id = %room.id, error = %e, "compactor_count_updates_failed");
                    }
                }
            }
            offset += rooms.len() as i64;
        }
    }

    /// Folds the room's current snapshot (if any) with the prefix of its
    /// update log that is about to be pruned, then trims the log to the
    /// newest `keep_recent` rows. The newest `keep_recent` rows themselves
    /// are never folded into the snapshot — they stay live in the update
    /// table only, so snapshot and table never describe overlapping
    /// history (I2/I3). Snapshot write happens before the trim (not
    /// transactional together): a crash between the two leaves the log
    /// fully recoverable, since CRDT replay of the now-duplicated tail is
    /// idempotent.
    pub async fn compact_room(&self, room_id: &str) -> StoreResult<()> {
        let updates = self.store.list_updates(room_id).await?;
        let keep = self.keep_recent.max(0) as usize;
        if updates.len() <= keep {
            return Ok(());
        }
        let prune_count = updates.len() - keep;

        let mut frames: Vec<Vec<u8>> = match self.store.get_snapshot(room_id).await? {
            Some(snapshot) => split_snapshot_blob(&snapshot.bytes),
            None => Vec::new(),
        };
        frames.extend(updates.into_iter().take(prune_count).map(|u| u.bytes));

        let merged_count = frames.len() as i64;
        let blob = build_snapshot_blob(frames.iter().map(|f| f.as_slice()));
        self.store.put_snapshot(room_id, &blob, merged_count).await?;
        self.store
            .truncate_updates_keeping_tail(room_id, self.keep_recent)
            .await?;
        Ok(())
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(DEFAULT_INTERVAL);
        loop {
            ticker.tick().await;
            self.run_tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::sqlite_store::SqliteStore;

    async fn test_store() -> Arc<dyn Store> {
        let pool = crate::infrastructure::db::connect_pool(":memory:").await.unwrap();
        crate::infrastructure::db::migrate(&pool).await.unwrap();
        Arc::new(SqliteStore::new(pool))
    }

    #[tokio::test]
    async fn compact_now_snapshots_and_trims() {
        let store = test_store().await;
        store.create_room_if_absent("r1", "r1").await.unwrap();
        for i in 0..15u8 {
            store.append_update("r1", &[0x00, 0x02, i]).await.unwrap();
        }

        let compactor = Compactor::with_thresholds(store.clone(), 1, 5);
        compactor.compact_room("r1").await.unwrap();

        assert_eq!(store.count_updates("r1").await.unwrap(), 5);
        let snapshot = store.get_snapshot("r1").await.unwrap().unwrap();
        assert_eq!(snapshot.merged_count, 10);
        assert_eq!(split_snapshot_blob(&snapshot.bytes).len(), 10);
    }

    #[tokio::test]
    async fn second_pass_folds_previous_snapshot_without_losing_history() {
        let store = test_store().await;
        store.create_room_if_absent("r1", "r1").await.unwrap();
        for i in 0..10u8 {
            store.append_update("r1", &[0x00, 0x02, i]).await.unwrap();
        }
        let compactor = Compactor::with_thresholds(store.clone(), 1, 3);
        compactor.compact_room("r1").await.unwrap();
        assert_eq!(store.count_updates("r1").await.unwrap(), 3);

        for i in 10..15u8 {
            store.append_update("r1", &[0x00, 0x02, i]).await.unwrap();
        }
        compactor.compact_room("r1").await.unwrap();

        let snapshot = store.get_snapshot("r1").await.unwrap().unwrap();
        // 7 pruned from the first pass (10 - keep 3) + 5 pruned from the
        // second (8 in the table - keep 3) = 12, tail never duplicated in.
        assert_eq!(snapshot.merged_count, 12);
        assert_eq!(store.count_updates("r1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn run_tick_skips_rooms_below_threshold() {
        let store = test_store().await;
        store.create_room_if_absent("quiet", "quiet").await.unwrap();
        store.append_update("quiet", &[0x00, 0x02, 1]).await.unwrap();

        let compactor = Compactor::with_thresholds(store.clone(), 100, 10);
        compactor.run_tick().await;

        assert!(store.get_snapshot("quiet").await.unwrap().is_none());
        assert_eq!(store.count_updates("quiet").await.unwrap(), 1);
    }
}

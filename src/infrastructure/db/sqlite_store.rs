use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::application::ports::store::{NewVersion, Store, StoreError, StoreResult, StoreStats};
use crate::domain::room::{DocumentUpdate, NamedVersion, Room, RoomSnapshot};
use crate::infrastructure::db::SqlitePool;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_not_found(err: sqlx::Error) -> StoreError {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Io(other),
        }
    }
}

fn row_to_room(row: &sqlx::sqlite::SqliteRow) -> Room {
    Room {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        last_activity_at: row.get::<DateTime<Utc>, _>("last_activity_at"),
    }
}

fn row_to_update(row: &sqlx::sqlite::SqliteRow) -> DocumentUpdate {
    DocumentUpdate {
        seq: row.get("seq"),
        room_id: row.get("room_id"),
        bytes: row.get("bytes"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    }
}

fn row_to_version(row: &sqlx::sqlite::SqliteRow, with_content: bool) -> NamedVersion {
    NamedVersion {
        id: row.get("id"),
        room_id: row.get("room_id"),
        name: row.get("name"),
        description: row.get("description"),
        content: if with_content {
            Some(row.get("content"))
        } else {
            None
        },
        content_hash: row.get("content_hash"),
        created_by: row.get("created_by"),
        is_auto: row.get::<i64, _>("is_auto") != 0,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_room_if_absent(&self, id: &str, name: &str) -> StoreResult<Room> {
        sqlx::query("INSERT OR IGNORE INTO rooms (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        self.get_room(id).await
    }

    async fn get_room(&self, id: &str) -> StoreResult<Room> {
        let row = sqlx::query("SELECT id, name, created_at, last_activity_at FROM rooms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_room(&r)).ok_or(StoreError::NotFound)
    }

    async fn list_rooms(&self, limit: i64, offset: i64) -> StoreResult<Vec<Room>> {
        let rows = sqlx::query(
            "SELECT id, name, created_at, last_activity_at FROM rooms
             ORDER BY last_activity_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_room).collect())
    }

    async fn touch_room(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE rooms SET last_activity_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_room(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn append_update(&self, room_id: &str, bytes: &[u8]) -> StoreResult<DocumentUpdate> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO rooms (id, name) VALUES (?, ?)")
            .bind(room_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        let insert = sqlx::query("INSERT INTO document_updates (room_id, bytes) VALUES (?, ?)")
            .bind(room_id)
            .bind(bytes)
            .execute(&mut *tx)
            .await?;
        let seq = insert.last_insert_rowid();
        sqlx::query(
            "UPDATE rooms SET last_activity_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
        )
        .bind(room_id)
        .execute(&mut *tx)
        .await?;
        let row = sqlx::query("SELECT seq, room_id, bytes, created_at FROM document_updates WHERE seq = ?")
            .bind(seq)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row_to_update(&row))
    }

    async fn list_updates(&self, room_id: &str) -> StoreResult<Vec<DocumentUpdate>> {
        let rows = sqlx::query(
            "SELECT seq, room_id, bytes, created_at FROM document_updates
             WHERE room_id = ? ORDER BY seq ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_update).collect())
    }

    async fn count_updates(&self, room_id: &str) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM document_updates WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn truncate_updates_keeping_tail(&self, room_id: &str, keep: i64) -> StoreResult<()> {
        sqlx::query(
            "DELETE FROM document_updates WHERE room_id = ? AND seq NOT IN (
                SELECT seq FROM document_updates WHERE room_id = ? ORDER BY seq DESC LIMIT ?
             )",
        )
        .bind(room_id)
        .bind(room_id)
        .bind(keep)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_snapshot(&self, room_id: &str, bytes: &[u8], merged_count: i64) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO room_snapshots (room_id, bytes, merged_count, updated_at)
             VALUES (?, ?, ?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
             ON CONFLICT(room_id) DO UPDATE SET
                bytes = excluded.bytes,
                merged_count = excluded.merged_count,
                updated_at = excluded.updated_at",
        )
        .bind(room_id)
        .bind(bytes)
        .bind(merged_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_snapshot(&self, room_id: &str) -> StoreResult<Option<RoomSnapshot>> {
        let row = sqlx::query(
            "SELECT room_id, bytes, merged_count, created_at, updated_at
             FROM room_snapshots WHERE room_id = ?",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| RoomSnapshot {
            room_id: r.get("room_id"),
            bytes: r.get("bytes"),
            merged_count: r.get("merged_count"),
            created_at: r.get::<DateTime<Utc>, _>("created_at"),
            updated_at: r.get::<DateTime<Utc>, _>("updated_at"),
        }))
    }

    async fn create_version(&self, new_version: NewVersion<'_>) -> StoreResult<NamedVersion> {
        let insert = sqlx::query(
            "INSERT INTO document_versions
                (room_id, name, description, content, content_hash, created_by, is_auto)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_version.room_id)
        .bind(&new_version.name)
        .bind(&new_version.description)
        .bind(new_version.content)
        .bind(&new_version.content_hash)
        .bind(new_version.created_by)
        .bind(new_version.is_auto as i64)
        .execute(&self.pool)
        .await?;
        self.get_version(insert.last_insert_rowid()).await
    }

    async fn get_version(&self, id: i64) -> StoreResult<NamedVersion> {
        let row = sqlx::query(
            "SELECT id, room_id, name, description, content, content_hash, created_by, is_auto, created_at
             FROM document_versions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_version(&r, true)).ok_or(StoreError::NotFound)
    }

    async fn list_versions(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<NamedVersion>> {
        let rows = sqlx::query(
            "SELECT id, room_id, name, description, content_hash, created_by, is_auto, created_at
             FROM document_versions WHERE room_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| row_to_version(r, false)).collect())
    }

    async fn count_versions(&self, room_id: &str) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM document_versions WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn get_latest_version(&self, room_id: &str) -> StoreResult<Option<NamedVersion>> {
        let row = sqlx::query(
            "SELECT id, room_id, name, description, content, content_hash, created_by, is_auto, created_at
             FROM document_versions WHERE room_id = ?
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_version(&r, true)))
    }

    async fn delete_version(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM document_versions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn trim_auto_versions(&self, room_id: &str, keep: i64) -> StoreResult<()> {
        sqlx::query(
            "DELETE FROM document_versions WHERE room_id = ? AND is_auto = 1 AND id NOT IN (
                SELECT id FROM document_versions
                WHERE room_id = ? AND is_auto = 1
                ORDER BY created_at DESC, id DESC LIMIT ?
             )",
        )
        .bind(room_id)
        .bind(room_id)
        .bind(keep)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let rooms: i64 = sqlx::query("SELECT COUNT(*) AS n FROM rooms")
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_not_found)?
            .get("n");
        let updates: i64 = sqlx::query("SELECT COUNT(*) AS n FROM document_updates")
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_not_found)?
            .get("n");
        Ok(StoreStats {
            active_rooms: rooms,
            total_updates: updates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        let pool = crate::infrastructure::db::connect_pool(":memory:").await.unwrap();
        crate::infrastructure::db::migrate(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn append_update_preserves_order() {
        let store = memory_store().await;
        for i in 0..5u8 {
            store.append_update("r1", &[i]).await.unwrap();
        }
        let updates = store.list_updates("r1").await.unwrap();
        let bytes: Vec<u8> = updates.iter().map(|u| u.bytes[0]).collect();
        assert_eq!(bytes, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn get_room_not_found_is_distinguishable() {
        let store = memory_store().await;
        let err = store.get_room("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn snapshot_upsert_is_idempotent_per_room() {
        let store = memory_store().await;
        store.append_update("r1", &[1]).await.unwrap();
        store.put_snapshot("r1", b"first", 1).await.unwrap();
        store.put_snapshot("r1", b"second", 2).await.unwrap();
        let snap = store.get_snapshot("r1").await.unwrap().unwrap();
        assert_eq!(snap.bytes, b"second");
        assert_eq!(snap.merged_count, 2);
    }

    #[tokio::test]
    async fn truncate_updates_keeping_tail() {
        let store = memory_store().await;
        for i in 0..10u8 {
            store.append_update("r1", &[i]).await.unwrap();
        }
        store.truncate_updates_keeping_tail("r1", 3).await.unwrap();
        let remaining = store.list_updates("r1").await.unwrap();
        assert_eq!(remaining.len(), 3);
        let bytes: Vec<u8> = remaining.iter().map(|u| u.bytes[0]).collect();
        assert_eq!(bytes, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn delete_room_cascades() {
        let store = memory_store().await;
        store.append_update("r1", &[1]).await.unwrap();
        store.put_snapshot("r1", b"snap", 1).await.unwrap();
        store
            .create_version(NewVersion {
                room_id: "r1",
                name: "v1".into(),
                description: String::new(),
                content: "hello",
                content_hash: "abc".into(),
                created_by: None,
                is_auto: false,
            })
            .await
            .unwrap();

        store.delete_room("r1").await.unwrap();

        assert_eq!(store.count_updates("r1").await.unwrap(), 0);
        assert!(store.get_snapshot("r1").await.unwrap().is_none());
        assert_eq!(store.count_versions("r1").await.unwrap(), 0);
    }
}

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::room::{DocumentUpdate, NamedVersion, Room, RoomSnapshot};

/// Distinguishes "absent" from "I/O failure" at every call site (spec §4.1,
/// §7): handlers map `NotFound` to 404 and `Io` to 500.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("store I/O error: {0}")]
    Io(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub active_rooms: i64,
    pub total_updates: i64,
}

pub struct NewVersion<'a> {
    pub room_id: &'a str,
    pub name: String,
    pub description: String,
    pub content: &'a str,
    pub content_hash: String,
    pub created_by: Option<&'a str>,
    pub is_auto: bool,
}

/// Durable key/value over rooms, the append-only per-room update log, the
/// per-room snapshot slot and the per-room named-version log (spec §4.1).
/// Every operation is one transaction; concurrent writers are serialized
/// internally (I5).
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_room_if_absent(&self, id: &str, name: &str) -> StoreResult<Room>;
    async fn get_room(&self, id: &str) -> StoreResult<Room>;
    async fn list_rooms(&self, limit: i64, offset: i64) -> StoreResult<Vec<Room>>;
    async fn touch_room(&self, id: &str) -> StoreResult<()>;
    async fn delete_room(&self, id: &str) -> StoreResult<()>;

    async fn append_update(&self, room_id: &str, bytes: &[u8]) -> StoreResult<DocumentUpdate>;
    async fn list_updates(&self, room_id: &str) -> StoreResult<Vec<DocumentUpdate>>;
    async fn count_updates(&self, room_id: &str) -> StoreResult<i64>;
    async fn truncate_updates_keeping_tail(&self, room_id: &str, keep: i64) -> StoreResult<()>;

    async fn put_snapshot(
        &self,
        room_id: &str,
        bytes: &[u8],
        merged_count: i64,
    ) -> StoreResult<()>;
    async fn get_snapshot(&self, room_id: &str) -> StoreResult<Option<RoomSnapshot>>;

    async fn create_version(&self, new_version: NewVersion<'_>) -> StoreResult<NamedVersion>;
    async fn get_version(&self, id: i64) -> StoreResult<NamedVersion>;
    async fn list_versions(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<NamedVersion>>;
    async fn count_versions(&self, room_id: &str) -> StoreResult<i64>;
    async fn get_latest_version(&self, room_id: &str) -> StoreResult<Option<NamedVersion>>;
    async fn delete_version(&self, id: i64) -> StoreResult<()>;
    async fn trim_auto_versions(&self, room_id: &str, keep: i64) -> StoreResult<()>;

    async fn stats(&self) -> StoreResult<StoreStats>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named collaboration room. Created on first reference (explicit create
/// or first appended update); deleting a room cascades to its updates,
/// snapshot and versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// One CRDT sync frame, persisted verbatim (invariant I1). `seq` is
/// monotonic per store and defines replay order for late joiners (I3).
/// Not JSON-exposed anywhere in the HTTP surface, so it carries no
/// serde impls of its own.
#[derive(Debug, Clone)]
pub struct DocumentUpdate {
    pub seq: i64,
    pub room_id: String,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Concatenation of a prefix of a room's update log, length-prefixed per
/// frame (see `domain::frame`). One row per room, overwritten by the
/// compactor (invariant I2).
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub bytes: Vec<u8>,
    pub merged_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A full-text snapshot of a document's current contents, independent of the
/// CRDT update log. Auto-saves dedup against the latest row for the room
/// (invariant I4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedVersion {
    pub id: i64,
    pub room_id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub content_hash: String,
    pub created_by: Option<String>,
    pub is_auto: bool,
    pub created_at: DateTime<Utc>,
}

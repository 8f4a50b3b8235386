use std::collections::HashMap;

use tokio::sync::RwLock;

/// In-memory per-room cache of replayable updates and awareness states
/// (spec §3, §4.3). Owned logically by the hub scheduler but readable by
/// stats and compactor-driven readers, hence the internal lock rather than
/// being bare scheduler-local state — the hub's member-set map gets no such
/// lock, since that one really is scheduler-exclusive (spec §9).
#[derive(Default)]
pub struct RoomState {
    updates: RwLock<Vec<Vec<u8>>>,
    awareness: RwLock<HashMap<String, Vec<u8>>>,
}

impl RoomState {
    pub fn from_retained_updates(updates: Vec<Vec<u8>>) -> Self {
        Self {
            updates: RwLock::new(updates),
            awareness: RwLock::new(HashMap::new()),
        }
    }

    pub async fn push_update(&self, frame: Vec<u8>) {
        self.updates.write().await.push(frame);
    }

    pub async fn updates_snapshot(&self) -> Vec<Vec<u8>> {
        self.updates.read().await.clone()
    }

    pub async fn set_awareness(&self, client_id: &str, frame: Vec<u8>) {
        self.awareness.write().await.insert(client_id.to_string(), frame);
    }

    pub async fn awareness_snapshot(&self) -> Vec<Vec<u8>> {
        self.awareness.read().await.values().cloned().collect()
    }

    pub async fn clear_awareness(&self, client_id: &str) {
        self.awareness.write().await.remove(client_id);
    }
}

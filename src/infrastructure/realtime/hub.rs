//! Single-threaded coordinator for room membership and broadcast (spec
//! §4.3). One scheduler task drains a bounded mailbox of `HubCommand`s;
//! all mutation of the member-set map and the room-state map happens there,
//! eliminating the need for fine-grained locking of room membership (§9).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use crate::application::ports::store::Store;
use crate::domain::frame::split_snapshot_blob;
use crate::infrastructure::realtime::room_state::RoomState;

/// The hub's single mailbox. Modeled as one channel carrying all four
/// message variants from spec §4.3/§9 rather than four separate channels,
/// since a single scheduler drains them in arrival order regardless.
enum HubCommand {
    Register {
        room_id: String,
        client_id: String,
        sender: mpsc::Sender<Vec<u8>>,
    },
    Unregister {
        room_id: String,
        client_id: String,
    },
    Broadcast {
        room_id: String,
        client_id: String,
        frame: Vec<u8>,
    },
    Stop,
}

const MAILBOX_CAPACITY: usize = 256;

type MemberMap = HashMap<String, HashMap<String, mpsc::Sender<Vec<u8>>>>;
type RoomStateMap = HashMap<String, Arc<RoomState>>;

#[derive(Clone)]
pub struct Hub {
    cmd_tx: mpsc::Sender<HubCommand>,
    members: Arc<RwLock<MemberMap>>,
}

impl Hub {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let members: Arc<RwLock<MemberMap>> = Arc::new(RwLock::new(HashMap::new()));
        let room_states: Arc<RwLock<RoomStateMap>> = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(scheduler_loop(cmd_rx, members.clone(), room_states, store));

        Self { cmd_tx, members }
    }

    pub async fn register(
        &self,
        room_id: impl Into<String>,
        client_id: impl Into<String>,
        sender: mpsc::Sender<Vec<u8>>,
    ) {
        let _ = self
            .cmd_tx
            .send(HubCommand::Register {
                room_id: room_id.into(),
                client_id: client_id.into(),
                sender,
            })
            .await;
    }

    pub async fn unregister(&self, room_id: impl Into<String>, client_id: impl Into<String>) {
        let _ = self
            .cmd_tx
            .send(HubCommand::Unregister {
                room_id: room_id.into(),
                client_id: client_id.into(),
            })
            .await;
    }

    pub async fn broadcast(
        &self,
        room_id: impl Into<String>,
        client_id: impl Into<String>,
        frame: Vec<u8>,
    ) {
        let _ = self
            .cmd_tx
            .send(HubCommand::Broadcast {
                room_id: room_id.into(),
                client_id: client_id.into(),
                frame,
            })
            .await;
    }

    pub async fn stop(&self) {
        let _ = self.cmd_tx.send(HubCommand::Stop).await;
    }

    /// Read-side snapshot, taken concurrently under a lock covering only
    /// the member-set map (spec §4.3).
    pub async fn active_room_count(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn client_count(&self) -> usize {
        self.members.read().await.values().map(|m| m.len()).sum()
    }

    pub async fn active_rooms(&self) -> Vec<String> {
        self.members.read().await.keys().cloned().collect()
    }
}

async fn scheduler_loop(
    mut cmd_rx: mpsc::Receiver<HubCommand>,
    members: Arc<RwLock<MemberMap>>,
    room_states: Arc<RwLock<RoomStateMap>>,
    store: Arc<dyn Store>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            HubCommand::Register {
                room_id,
                client_id,
                sender,
            } => {
                handle_register(&members, &room_states, &store, room_id, client_id, sender).await;
            }
            HubCommand::Unregister { room_id, client_id } => {
                handle_unregister(&members, &room_states, room_id, client_id).await;
            }
            HubCommand::Broadcast {
                room_id,
                client_id,
                frame,
            } => {
                handle_broadcast(&members, &room_states, &store, room_id, client_id, frame).await;
            }
            HubCommand::Stop => break,
        }
    }
    tracing::info!("hub_scheduler_stopped");
}

async fn get_or_create_room_state(
    room_states: &Arc<RwLock<RoomStateMap>>,
    store: &Arc<dyn Store>,
    room_id: &str,
) -> Arc<RoomState> {
    if let Some(state) = room_states.read().await.get(room_id) {
        return state.clone();
    }

    let mut retained = match store.get_snapshot(room_id).await {
        Ok(Some(snapshot)) => split_snapshot_blob(&snapshot.bytes),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::error!(room_id, error = %e, "catchup_snapshot_load_failed");
            Vec::new()
        }
    };
    match store.list_updates(room_id).await {
        Ok(updates) => retained.extend(updates.into_iter().map(|u| u.bytes)),
        Err(e) => {
            tracing::error!(room_id, error = %e, "catchup_updates_load_failed");
        }
    }

    let state = Arc::new(RoomState::from_retained_updates(retained));
    room_states
        .write()
        .await
        .insert(room_id.to_string(), state.clone());
    state
}

async fn handle_register(
    members: &Arc<RwLock<MemberMap>>,
    room_states: &Arc<RwLock<RoomStateMap>>,
    store: &Arc<dyn Store>,
    room_id: String,
    client_id: String,
    sender: mpsc::Sender<Vec<u8>>,
) {
    {
        let mut guard = members.write().await;
        guard
            .entry(room_id.clone())
            .or_default()
            .insert(client_id.clone(), sender.clone());
    }

    let room_state = get_or_create_room_state(room_states, store, &room_id).await;

    for frame in room_state.updates_snapshot().await {
        if let Err(TrySendError::Full(_)) = sender.try_send(frame) {
            tracing::warn!(room_id, client_id, "catchup_buffer_full_dropping_remaining");
            return;
        }
    }
    for frame in room_state.awareness_snapshot().await {
        if let Err(TrySendError::Full(_)) = sender.try_send(frame) {
            tracing::warn!(
                room_id,
                client_id,
                "catchup_awareness_buffer_full_dropping_remaining"
            );
            return;
        }
    }
}

async fn handle_unregister(
    members: &Arc<RwLock<MemberMap>>,
    room_states: &Arc<RwLock<RoomStateMap>>,
    room_id: String,
    client_id: String,
) {
    {
        let mut guard = members.write().await;
        if let Some(room_members) = guard.get_mut(&room_id) {
            room_members.remove(&client_id);
            if room_members.is_empty() {
                guard.remove(&room_id);
            }
        }
    }
    if let Some(state) = room_states.read().await.get(&room_id) {
        state.clear_awareness(&client_id).await;
    }
}

async fn handle_broadcast(
    members: &Arc<RwLock<MemberMap>>,
    room_states: &Arc<RwLock<RoomStateMap>>,
    store: &Arc<dyn Store>,
    room_id: String,
    client_id: String,
    frame: Vec<u8>,
) {
    let room_state = get_or_create_room_state(room_states, store, &room_id).await;

    match frame.first() {
        Some(0x00) => {
            room_state.push_update(frame.clone()).await;
            if let Err(e) = store.append_update(&room_id, &frame).await {
                tracing::error!(room_id, error = %e, "persist_update_failed");
            }
        }
        Some(0x01) => {
            room_state.set_awareness(&client_id, frame.clone()).await;
        }
        _ => {
            tracing::debug!(room_id, "broadcast_frame_unrecognized_kind_forwarding_only");
        }
    }

    let mut guard = members.write().await;
    let Some(room_members) = guard.get_mut(&room_id) else {
        return;
    };
    let mut evict = Vec::new();
    for (member_id, member_sender) in room_members.iter() {
        if member_id == &client_id {
            continue;
        }
        match member_sender.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                evict.push(member_id.clone());
            }
        }
    }
    for member_id in evict {
        tracing::warn!(room_id, client_id = member_id, "slow_consumer_evicted");
        room_members.remove(&member_id);
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
    async fn sender_does_not_receive_its_own_broadcast() {
        let store = test_store().await;
        let hub = Hub::new(store);
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register("r1", "a", tx_a).await;
        hub.register("r1", "b", tx_b).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let frame = vec![0x00, 0x02, 0xDE, 0xAD];
        hub.broadcast("r1", "a", frame.clone()).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let received = rx_b.try_recv().expect("b should receive the frame");
        assert_eq!(received, frame);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn awareness_not_persisted_but_forwarded() {
        let store = test_store().await;
        let hub = Hub::new(store.clone());
        let (tx_a, _rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register("r2", "a", tx_a).await;
        hub.register("r2", "b", tx_b).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let frame = vec![0x01, 0x00];
        hub.broadcast("r2", "a", frame.clone()).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(rx_b.try_recv().unwrap(), frame);
        assert_eq!(store.count_updates("r2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unregister_clears_awareness_so_late_joiners_do_not_see_stale_presence() {
        let store = test_store().await;
        let hub = Hub::new(store);
        let (tx_a, _rx_a) = mpsc::channel(8);
        hub.register("r5", "a", tx_a).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        hub.broadcast("r5", "a", vec![0x01, 0x00, 0xAB]).await;
        hub.unregister("r5", "a").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register("r5", "b", tx_b).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_joiner_replays_retained_updates_in_order() {
        let store = test_store().await;
        let hub = Hub::new(store);
        let (tx_a, _rx_a) = mpsc::channel(8);
        hub.register("r3", "a", tx_a).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let frames: Vec<Vec<u8>> = (0..3)
            .map(|i| vec![0x00, 0x02, i as u8])
            .collect();
        for f in &frames {
            hub.broadcast("r3", "a", f.clone()).await;
        }
        hub.unregister("r3", "a").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register("r3", "b", tx_b).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        for expected in &frames {
            assert_eq!(&rx_b.try_recv().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn slow_consumer_is_evicted_on_full_buffer() {
        let store = test_store().await;
        let hub = Hub::new(store);
        let (tx_a, _rx_a) = mpsc::channel(8);
        let (tx_slow, _rx_slow_keep_open) = mpsc::channel::<Vec<u8>>(1);
        hub.register("r4", "a", tx_a).await;
        hub.register("r4", "slow", tx_slow).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Fill the slow consumer's buffer then push it over.
        for i in 0..3u8 {
            hub.broadcast("r4", "a", vec![0x00, 0x02, i]).await;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        assert_eq!(hub.client_count().await, 1);
    }
}

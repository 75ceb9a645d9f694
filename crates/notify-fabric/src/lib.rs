//! Notification Fabric: routes typed events to all subscribers of a
//! session. Every other component in the engine is write-only against
//! this crate; nothing here ever blocks or fails a publisher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use engine_core_types::SessionId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names the engine emits, per the external WebSocket protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    SessionStart,
    SessionUpdate,
    SessionComplete,
    SessionStopped,
    Error,
    Intervention,
    ActionLog,
    Screenshot,
    ScreenshotStream,
    OwlVision,
    ClickByMark,
    StreamFrame,
    StreamError,
}

/// A single published event, addressed at a session room.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub session_id: SessionId,
    pub event: EventName,
    pub payload: serde_json::Value,
    /// Monotonic sequence within the room; gives subscribers a cheap way
    /// to detect gaps even though broadcast channels already guarantee
    /// FIFO delivery per receiver.
    pub seq: u64,
}

const ROOM_CAPACITY: usize = 256;

struct Room {
    sender: broadcast::Sender<Notification>,
    seq: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Room {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(ROOM_CAPACITY);
        Self {
            sender,
            seq: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
}

/// Process-wide fan-out fabric, one room per session id.
#[derive(Clone, Default)]
pub struct NotificationFabric {
    rooms: Arc<DashMap<SessionId, Arc<Room>>>,
}

impl NotificationFabric {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
        }
    }

    /// Joins the room for `session_id`, creating it if this is the first
    /// subscriber. The returned receiver is the "connection" in the
    /// spec's `subscribe(connection, session_id)` contract: dropping it
    /// is equivalent to `unsubscribe_on_disconnect`.
    pub fn subscribe(&self, session_id: &SessionId) -> broadcast::Receiver<Notification> {
        let room = self
            .rooms
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Room::new()))
            .clone();
        room.sender.subscribe()
    }

    /// Broadcasts `payload` to all current members of `session_id`'s room.
    /// A missing room, or a room with zero live receivers, is a no-op:
    /// this never fails the caller.
    pub fn publish(&self, session_id: &SessionId, event: EventName, payload: serde_json::Value) {
        let Some(room) = self.rooms.get(session_id).map(|r| r.clone()) else {
            tracing::debug!(target: "notify_fabric", session = %session_id, "publish to empty room");
            return;
        };
        let seq = room.seq.fetch_add(1, Ordering::SeqCst);
        let notification = Notification {
            session_id: session_id.clone(),
            event,
            payload,
            seq,
        };
        match room.sender.send(notification) {
            Ok(receivers) => {
                room.delivered.fetch_add(receivers as u64, Ordering::Relaxed);
            }
            Err(_) => {
                // No live receivers right now; not an error, just counted.
                room.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drops the room entirely once it has no subscribers left. Safe to
    /// call speculatively after a connection disconnects; a room with
    /// active subscribers is left untouched.
    pub fn vacuum(&self, session_id: &SessionId) {
        if let Some(room) = self.rooms.get(session_id) {
            if room.sender.receiver_count() == 0 {
                drop(room);
                self.rooms.remove(session_id);
            }
        }
    }

    /// Number of rooms currently tracked; used by health/metrics.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn subscriber_count(&self, session_id: &SessionId) -> usize {
        self.rooms
            .get(session_id)
            .map(|r| r.sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_to_missing_room_is_noop() {
        let fabric = NotificationFabric::new();
        fabric.publish(
            &SessionId("ghost".into()),
            EventName::Error,
            serde_json::json!({}),
        );
    }

    #[tokio::test]
    async fn subscribe_then_publish_delivers_exactly_once() {
        let fabric = NotificationFabric::new();
        let session = SessionId::new();
        let mut rx = fabric.subscribe(&session);

        fabric.publish(&session, EventName::SessionStart, serde_json::json!({"ok": true}));

        let got = rx.recv().await.expect("one notification");
        assert_eq!(got.event, EventName::SessionStart);
        assert_eq!(got.seq, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fifo_per_subscriber() {
        let fabric = NotificationFabric::new();
        let session = SessionId::new();
        let mut rx = fabric.subscribe(&session);

        fabric.publish(&session, EventName::ActionLog, serde_json::json!({"step": 1}));
        fabric.publish(&session, EventName::ActionLog, serde_json::json!({"step": 2}));
        fabric.publish(&session, EventName::ActionLog, serde_json::json!({"step": 3}));

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        let c = rx.recv().await.unwrap();
        assert_eq!((a.seq, b.seq, c.seq), (0, 1, 2));
    }

    #[tokio::test]
    async fn vacuum_drops_room_with_no_subscribers() {
        let fabric = NotificationFabric::new();
        let session = SessionId::new();
        let rx = fabric.subscribe(&session);
        assert_eq!(fabric.room_count(), 1);
        drop(rx);
        fabric.vacuum(&session);
        assert_eq!(fabric.room_count(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_a_copy() {
        let fabric = NotificationFabric::new();
        let session = SessionId::new();
        let mut rx1 = fabric.subscribe(&session);
        let mut rx2 = fabric.subscribe(&session);

        fabric.publish(&session, EventName::Screenshot, serde_json::json!({"n": 1}));

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }
}

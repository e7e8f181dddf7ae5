use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::events::RoomEvent;

/// Room-addressed broadcast hub: one lazily-created channel per room.
///
/// Rooms are named `user:<id>` and `group:<id>`. Joining a room is subscribing
/// to its channel; leaving is dropping the receiver. Emission is
/// fire-and-forget: a room with no live subscribers receives nothing and no
/// backlog is kept.
pub struct RoomHub {
    capacity: usize,
    rooms: DashMap<String, broadcast::Sender<RoomEvent>>,
}

/// Name of the per-user room.
pub fn user_room(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

/// Name of the per-group room.
pub fn group_room(group_id: Uuid) -> String {
    format!("group:{group_id}")
}

impl RoomHub {
    /// Hub whose per-room channels buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: DashMap::new(),
        }
    }

    /// Join a room, creating its channel on first subscription.
    pub fn join(&self, room: &str) -> broadcast::Receiver<RoomEvent> {
        self.rooms
            .entry(room.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Emit an event to a room, ignoring delivery failures. Rooms whose last
    /// subscriber is gone are dropped on the way.
    pub fn emit(&self, room: &str, event: RoomEvent) {
        let Some(sender) = self.rooms.get(room).map(|entry| entry.clone()) else {
            return;
        };

        if sender.send(event).is_err() {
            // No receivers left; forget the room so the map does not grow
            // with every client that ever connected.
            self.rooms
                .remove_if(room, |_, sender| sender.receiver_count() == 0);
        }
    }

    /// Number of live subscribers across a room, zero when the room is unknown.
    pub fn subscriber_count(&self, room: &str) -> usize {
        self.rooms
            .get(room)
            .map(|entry| entry.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> RoomEvent {
        RoomEvent {
            event: name.to_owned(),
            data: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_room_events() {
        let hub = RoomHub::new(16);
        let user = Uuid::new_v4();
        let mut receiver = hub.join(&user_room(user));

        hub.emit(&user_room(user), event("timer.started"));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event, "timer.started");
    }

    #[tokio::test]
    async fn emit_to_empty_room_is_a_no_op() {
        let hub = RoomHub::new(16);
        hub.emit(&group_room(Uuid::new_v4()), event("timer.completed"));
    }

    #[tokio::test]
    async fn abandoned_rooms_are_dropped() {
        let hub = RoomHub::new(16);
        let room = group_room(Uuid::new_v4());

        drop(hub.join(&room));
        hub.emit(&room, event("timer.completed"));

        assert_eq!(hub.subscriber_count(&room), 0);
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = RoomHub::new(16);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut receiver_b = hub.join(&user_room(b));

        hub.emit(&user_room(a), event("timer.started"));

        assert!(matches!(
            receiver_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}

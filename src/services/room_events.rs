//! Broadcast helpers that route domain events into the room hub.
//!
//! Every helper is fire-and-forget: serialization failures are logged and the
//! event dropped, rooms without subscribers silently swallow it.

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::events::{GroupMemberEvent, GroupTaskEvent, RoomEvent, TimerCompletedEvent,
                  TimerStartedEvent},
    state::{
        SharedState,
        rooms::{group_room, user_room},
    },
};

/// Event name: a work timer was started.
pub const TIMER_STARTED: &str = "timer.started";
/// Event name: a work timer was completed.
pub const TIMER_COMPLETED: &str = "timer.completed";
/// Event name: a task was created in a group.
pub const GROUP_TASK_CREATED: &str = "group.task.created";
/// Event name: a group task changed.
pub const GROUP_TASK_UPDATED: &str = "group.task.updated";
/// Event name: a group task was deleted.
pub const GROUP_TASK_DELETED: &str = "group.task.deleted";
/// Event name: a user joined a group.
pub const GROUP_MEMBER_JOINED: &str = "group.member.joined";
/// Event name: a user left a group.
pub const GROUP_MEMBER_LEFT: &str = "group.member.left";
/// Event name: a group member's role changed.
pub const GROUP_MEMBER_ROLE_CHANGED: &str = "group.member.role_changed";

fn emit_to<T: Serialize>(state: &SharedState, rooms: &[String], event_name: &str, payload: &T) {
    let event = match RoomEvent::json(event_name, payload) {
        Ok(event) => event,
        Err(err) => {
            warn!(event = event_name, error = %err, "failed to serialize room event");
            return;
        }
    };
    for room in rooms {
        state.rooms().emit(room, event.clone());
    }
}

/// Announce a started timer to the user's room and, if grouped, the group's.
pub fn broadcast_timer_started(state: &SharedState, payload: &TimerStartedEvent) {
    let mut rooms = vec![user_room(payload.user_id)];
    if let Some(group_id) = payload.group_id {
        rooms.push(group_room(group_id));
    }
    emit_to(state, &rooms, TIMER_STARTED, payload);
}

/// Announce a completed timer to the user's room and, if grouped, the group's.
pub fn broadcast_timer_completed(state: &SharedState, payload: &TimerCompletedEvent) {
    let mut rooms = vec![user_room(payload.user_id)];
    if let Some(group_id) = payload.group_id {
        rooms.push(group_room(group_id));
    }
    emit_to(state, &rooms, TIMER_COMPLETED, payload);
}

/// Publish a `group.task.*` event into the group's room.
///
/// Task CRUD lives outside this crate; it calls in here so its notifications
/// travel the same hub as the timer lifecycle ones.
pub fn publish_group_task_event(state: &SharedState, event_name: &str, payload: &GroupTaskEvent) {
    emit_to(state, &[group_room(payload.group_id)], event_name, payload);
}

/// Publish a `group.member.*` event into the group's room.
pub fn publish_group_member_event(
    state: &SharedState,
    event_name: &str,
    payload: &GroupMemberEvent,
) {
    emit_to(state, &[group_room(payload.group_id)], event_name, payload);
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn timer_events_reach_both_rooms() {
        let state = AppState::new(AppConfig::default());
        let user_id = Uuid::new_v4();
        let group_id = Uuid::new_v4();
        let mut user_rx = state.rooms().join(&user_room(user_id));
        let mut group_rx = state.rooms().join(&group_room(group_id));

        broadcast_timer_started(
            &state,
            &TimerStartedEvent {
                timer_id: Uuid::new_v4(),
                task_id: Uuid::new_v4(),
                user_id,
                group_id: Some(group_id),
                started_at: "2026-01-01T00:00:00Z".into(),
            },
        );

        assert_eq!(user_rx.recv().await.unwrap().event, TIMER_STARTED);
        assert_eq!(group_rx.recv().await.unwrap().event, TIMER_STARTED);
    }

    #[tokio::test]
    async fn group_publish_helpers_address_the_group_room() {
        let state = AppState::new(AppConfig::default());
        let group_id = Uuid::new_v4();
        let mut group_rx = state.rooms().join(&group_room(group_id));

        publish_group_member_event(
            &state,
            GROUP_MEMBER_JOINED,
            &GroupMemberEvent {
                group_id,
                user_id: Uuid::new_v4(),
                role: None,
            },
        );

        let event = group_rx.recv().await.unwrap();
        assert_eq!(event.event, GROUP_MEMBER_JOINED);
        assert_eq!(event.data["group_id"], group_id.to_string());
    }
}

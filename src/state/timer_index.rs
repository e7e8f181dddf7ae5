//! Active-timer index: a rebuildable projection of the store's active timers.
//!
//! The index answers "does this user already have a running timer" without a
//! store round-trip and, through its reservation API, turns the start-timer
//! existence check into an atomic check-and-set. The store stays authoritative:
//! entries are repaired from it whenever the two disagree.

use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

/// Index value: which timer on which task a user is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTimerKey {
    /// Task the timer runs against.
    pub task_id: Uuid,
    /// The active timer itself.
    pub timer_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
enum IndexSlot {
    /// A start call holds the slot while it writes the store.
    Reserved,
    /// A durable active timer is on record.
    Bound(ActiveTimerKey),
}

/// Per-user active timer index.
#[derive(Default)]
pub struct ActiveTimerIndex {
    slots: DashMap<Uuid, IndexSlot>,
}

impl ActiveTimerIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound entry for the user, if any. Reservations held by in-flight start
    /// calls are not visible here; their timers are not durable yet.
    pub fn lookup(&self, user_id: Uuid) -> Option<ActiveTimerKey> {
        match self.slots.get(&user_id).map(|slot| *slot) {
            Some(IndexSlot::Bound(key)) => Some(key),
            _ => None,
        }
    }

    /// Whether any slot (reserved or bound) exists for the user.
    pub fn occupied(&self, user_id: Uuid) -> bool {
        self.slots.contains_key(&user_id)
    }

    /// Atomically claim the user's slot. Returns `None` when a timer is
    /// already indexed or another start call holds the reservation; exactly
    /// one of two racing callers succeeds.
    pub fn try_reserve(&self, user_id: Uuid) -> Option<Reservation<'_>> {
        match self.slots.entry(user_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(IndexSlot::Reserved);
                Some(Reservation {
                    index: self,
                    user_id,
                    committed: false,
                })
            }
        }
    }

    /// Repair path: record a durable active timer discovered in the store.
    pub fn bind(&self, user_id: Uuid, key: ActiveTimerKey) {
        self.slots.insert(user_id, IndexSlot::Bound(key));
    }

    /// Drop the user's entry (timer completed, or the entry proved stale).
    pub fn clear(&self, user_id: Uuid) {
        self.slots.remove(&user_id);
    }
}

/// Exclusive claim on a user's index slot, released on drop unless committed.
pub struct Reservation<'a> {
    index: &'a ActiveTimerIndex,
    user_id: Uuid,
    committed: bool,
}

impl Reservation<'_> {
    /// Bind the reserved slot to a now-durable timer.
    pub fn commit(mut self, key: ActiveTimerKey) {
        self.index.bind(self.user_id, key);
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.index.clear(self.user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ActiveTimerKey {
        ActiveTimerKey {
            task_id: Uuid::new_v4(),
            timer_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn only_one_reservation_per_user() {
        let index = ActiveTimerIndex::new();
        let user = Uuid::new_v4();

        let first = index.try_reserve(user);
        assert!(first.is_some());
        assert!(index.try_reserve(user).is_none());
    }

    #[test]
    fn dropped_reservation_releases_the_slot() {
        let index = ActiveTimerIndex::new();
        let user = Uuid::new_v4();

        drop(index.try_reserve(user));
        assert!(!index.occupied(user));
        assert!(index.try_reserve(user).is_some());
    }

    #[test]
    fn committed_reservation_becomes_visible() {
        let index = ActiveTimerIndex::new();
        let user = Uuid::new_v4();
        let bound = key();

        index.try_reserve(user).unwrap().commit(bound);

        assert_eq!(index.lookup(user), Some(bound));
        assert!(index.try_reserve(user).is_none());
    }

    #[test]
    fn reservations_are_invisible_to_lookup() {
        let index = ActiveTimerIndex::new();
        let user = Uuid::new_v4();

        let _reservation = index.try_reserve(user).unwrap();
        assert_eq!(index.lookup(user), None);
        assert!(index.occupied(user));
    }

    #[test]
    fn clear_then_rebind_repairs_a_stale_entry() {
        let index = ActiveTimerIndex::new();
        let user = Uuid::new_v4();
        index.bind(user, key());

        index.clear(user);
        assert_eq!(index.lookup(user), None);

        let repaired = key();
        index.bind(user, repaired);
        assert_eq!(index.lookup(user), Some(repaired));
    }
}

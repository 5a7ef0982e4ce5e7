// SPDX-License-Identifier: MIT

//! The in-process Event Bus (§4.F): publish is non-blocking and
//! best-effort, a subscriber that cannot keep up is dropped once its
//! bounded outbound buffer fills, and a per-project ring buffer retains
//! recent events for replay on dashboard reconnect.

use fleet_core::event::Room;
use fleet_core::{Event, ProjectNumber};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

struct Subscriber {
    rooms: HashSet<Room>,
    sender: mpsc::Sender<Event>,
}

struct Inner {
    subscribers: HashMap<u64, Subscriber>,
    project_rings: HashMap<ProjectNumber, VecDeque<Event>>,
}

pub struct EventBus {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    ring_capacity: usize,
    subscriber_capacity: usize,
}

pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<Event>,
}

impl EventBus {
    pub fn new(ring_capacity: usize, subscriber_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { subscribers: HashMap::new(), project_rings: HashMap::new() }),
            next_id: AtomicU64::new(1),
            ring_capacity,
            subscriber_capacity,
        }
    }

    /// Registers a new subscriber interested in `rooms` and returns its
    /// receiver half. The WebSocket gateway owns the `Subscription` for
    /// the lifetime of one connection.
    pub fn subscribe(&self, rooms: HashSet<Room>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(self.subscriber_capacity);
        self.inner.lock().subscribers.insert(id, Subscriber { rooms, sender });
        Subscription { id, receiver }
    }

    /// Replaces a subscriber's room set, used by `subscribe`/
    /// `subscribeProjects` messages on an already-open connection.
    pub fn set_rooms(&self, id: u64, rooms: HashSet<Room>) {
        if let Some(sub) = self.inner.lock().subscribers.get_mut(&id) {
            sub.rooms = rooms;
        }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.inner.lock().subscribers.remove(&id);
    }

    /// Fans `event` out to every subscriber whose room set intersects the
    /// event's rooms. Never blocks: a full outbound channel means that
    /// subscriber is dropped, not that the publisher waits.
    pub fn publish(&self, event: Event) {
        let rooms = event.rooms();
        let mut inner = self.inner.lock();

        for room in &rooms {
            if let Room::Project(project_number) = room {
                let ring = inner.project_rings.entry(*project_number).or_default();
                ring.push_back(event.clone());
                while ring.len() > self.ring_capacity {
                    ring.pop_front();
                }
            }
        }

        if rooms.is_empty() {
            return;
        }

        let mut dead = Vec::new();
        for (id, sub) in inner.subscribers.iter() {
            let interested = sub.rooms.iter().any(|r| rooms.contains(r));
            if interested && sub.sender.try_send(event.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            inner.subscribers.remove(&id);
        }
    }

    /// The last `ring_capacity` events for a project, oldest first — used
    /// to let a reconnecting dashboard catch up (§4.F).
    pub fn replay(&self, project_number: ProjectNumber) -> Vec<Event> {
        self.inner.lock().project_rings.get(&project_number).map(|r| r.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_core::{Machine, MachineId, Session};
    use std::collections::BTreeSet;

    fn session_event(project_id: u64) -> Event {
        let session = Session::new(project_id, MachineId::new("host-1"), Some(1), Utc::now());
        Event::SessionCreated { session }
    }

    #[test]
    fn subscriber_in_room_receives_event() {
        let bus = EventBus::new(50, 256);
        let sub = bus.subscribe(HashSet::from([Room::Project(79)]));
        bus.publish(session_event(79));
        assert!(sub.receiver.try_recv().is_ok());
    }

    #[test]
    fn subscriber_outside_room_does_not_receive() {
        let bus = EventBus::new(50, 256);
        let sub = bus.subscribe(HashSet::from([Room::Project(1)]));
        bus.publish(session_event(79));
        assert!(sub.receiver.try_recv().is_err());
    }

    #[test]
    fn slow_subscriber_is_dropped_once_buffer_fills() {
        let bus = EventBus::new(50, 2);
        let _sub = bus.subscribe(HashSet::from([Room::Project(79)]));
        assert_eq!(bus.subscriber_count(), 1);

        for _ in 0..5 {
            bus.publish(session_event(79));
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn ring_buffer_caps_at_capacity_and_keeps_newest() {
        let bus = EventBus::new(2, 256);
        for _ in 0..5 {
            bus.publish(session_event(79));
        }
        assert_eq!(bus.replay(79).len(), 2);
    }

    #[test]
    fn events_with_no_rooms_are_not_buffered_or_fanned_out() {
        let bus = EventBus::new(50, 256);
        let machine = Machine::new(MachineId::new("host-1"), "host-1".into(), BTreeSet::new(), Utc::now());
        bus.publish(Event::MachineRegistered { machine });
        assert_eq!(bus.replay(79).len(), 0);
    }
}

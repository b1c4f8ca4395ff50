//! Synchronous, typed, cancellable event bus.
//!
//! `publish` hands the same `&mut` event to every listener of that event type
//! in registration order and returns once all of them ran. Listeners see each
//! other's writes; the publisher reads the event's terminal state afterwards.
//! Publishing from inside a listener is not supported.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Marker for types that can travel over the bus.
pub trait Event: Any + Send {}

/// Events a listener may veto.
pub trait Cancellable {
    fn is_cancelled(&self) -> bool;
    fn set_cancelled(&mut self, cancelled: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Box<dyn FnMut(&mut E) + Send>;

struct Slot<E> {
    id: ListenerId,
    listener: Listener<E>,
}

trait ListenerList: Send {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn remove(&mut self, id: ListenerId) -> bool;
    fn len(&self) -> usize;
}

impl<E: Event> ListenerList for Vec<Slot<E>> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = Vec::len(self);
        self.retain(|slot| slot.id != id);
        Vec::len(self) != before
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<TypeId, Box<dyn ListenerList>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E: Event>(&mut self, listener: impl FnMut(&mut E) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let list = self
            .listeners
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<Slot<E>>::new()));
        if let Some(slots) = list.as_any_mut().downcast_mut::<Vec<Slot<E>>>() {
            slots.push(Slot {
                id,
                listener: Box::new(listener),
            });
        }
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.values_mut().any(|list| list.remove(id))
    }

    /// Deliver `event` to every listener of its type. Returns how many ran.
    pub fn publish<E: Event>(&mut self, event: &mut E) -> usize {
        let Some(list) = self.listeners.get_mut(&TypeId::of::<E>()) else {
            return 0;
        };
        let Some(slots) = list.as_any_mut().downcast_mut::<Vec<Slot<E>>>() else {
            return 0;
        };
        for slot in slots.iter_mut() {
            (slot.listener)(event);
        }
        slots.len()
    }

    pub fn listener_count<E: Event>(&self) -> usize {
        self.listeners
            .get(&TypeId::of::<E>())
            .map_or(0, |list| list.len())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total: usize = self.listeners.values().map(|l| l.len()).sum();
        f.debug_struct("EventBus")
            .field("event_types", &self.listeners.len())
            .field("listeners", &total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Ping {
        trail: Vec<&'static str>,
        cancelled: bool,
    }
    impl Event for Ping {}
    impl Cancellable for Ping {
        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
        fn set_cancelled(&mut self, cancelled: bool) {
            self.cancelled = cancelled;
        }
    }

    struct Pong;
    impl Event for Pong {}

    #[test]
    fn delivers_in_registration_order() {
        let mut bus = EventBus::new();
        bus.subscribe(|e: &mut Ping| e.trail.push("first"));
        bus.subscribe(|e: &mut Ping| e.trail.push("second"));
        bus.subscribe(|e: &mut Ping| e.trail.push("third"));

        let mut ping = Ping::default();
        assert_eq!(bus.publish(&mut ping), 3);
        assert_eq!(ping.trail, ["first", "second", "third"]);
    }

    #[test]
    fn later_listeners_see_earlier_writes() {
        let mut bus = EventBus::new();
        bus.subscribe(|e: &mut Ping| e.set_cancelled(true));
        let seen = Arc::new(Mutex::new(None));
        let seen_in = seen.clone();
        bus.subscribe(move |e: &mut Ping| {
            *seen_in.lock().unwrap() = Some(e.is_cancelled());
        });

        let mut ping = Ping::default();
        bus.publish(&mut ping);
        assert!(ping.is_cancelled());
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn only_matching_type_is_delivered() {
        let mut bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));
        let hits_in = hits.clone();
        bus.subscribe(move |_: &mut Pong| *hits_in.lock().unwrap() += 1);

        let mut ping = Ping::default();
        assert_eq!(bus.publish(&mut ping), 0);
        bus.publish(&mut Pong);
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(bus.listener_count::<Pong>(), 1);
        assert_eq!(bus.listener_count::<Ping>(), 0);
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(|e: &mut Ping| e.trail.push("gone"));
        bus.subscribe(|e: &mut Ping| e.trail.push("kept"));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        let mut ping = Ping::default();
        bus.publish(&mut ping);
        assert_eq!(ping.trail, ["kept"]);
    }
}

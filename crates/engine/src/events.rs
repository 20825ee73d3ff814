//! Bounded event queue with per-kind listener lists.
//!
//! `flush` dispatches exactly the events that were queued when it was called.
//! Listeners may emit while being dispatched; those events wait for the next
//! flush, so a flush always terminates after a bounded number of dispatches.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use crate::app::SceneId;
use crate::geometry::Vec2;

pub const EVENT_QUEUE_CAPACITY: usize = 256;
pub const MAX_LISTENERS_PER_KIND: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CollisionEnter,
    CollisionExit,
    ZoneEnter,
    ZoneExit,
    Interact,
    DialogStart,
    DialogEnd,
    SceneEntered,
    BattlePhaseChanged,
}

const EVENT_KIND_COUNT: usize = 9;

impl EventKind {
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::CollisionEnter,
        EventKind::CollisionExit,
        EventKind::ZoneEnter,
        EventKind::ZoneExit,
        EventKind::Interact,
        EventKind::DialogStart,
        EventKind::DialogEnd,
        EventKind::SceneEntered,
        EventKind::BattlePhaseChanged,
    ];

    const fn index(self) -> usize {
        match self {
            EventKind::CollisionEnter => 0,
            EventKind::CollisionExit => 1,
            EventKind::ZoneEnter => 2,
            EventKind::ZoneExit => 3,
            EventKind::Interact => 4,
            EventKind::DialogStart => 5,
            EventKind::DialogEnd => 6,
            EventKind::SceneEntered => 7,
            EventKind::BattlePhaseChanged => 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventPayload {
    #[default]
    None,
    Scene(SceneId),
    Phase(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub subject: i32,
    pub target: i32,
    pub position: Vec2,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            subject: 0,
            target: 0,
            position: Vec2::ZERO,
            payload: EventPayload::None,
        }
    }

    pub fn scene_entered(scene: SceneId) -> Self {
        Self {
            subject: scene.index() as i32,
            payload: EventPayload::Scene(scene),
            ..Self::new(EventKind::SceneEntered)
        }
    }

    pub fn battle_phase_changed(phase: u32) -> Self {
        Self {
            subject: phase as i32,
            payload: EventPayload::Phase(phase),
            ..Self::new(EventKind::BattlePhaseChanged)
        }
    }

    pub fn with_subject(mut self, subject: i32) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_target(mut self, target: i32) -> Self {
        self.target = target;
        self
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventBusError {
    #[error("event queue is full ({capacity} events); dropped {kind:?}")]
    QueueFull { kind: EventKind, capacity: usize },
    #[error("listener limit reached for {kind:?} ({limit} listeners)")]
    ListenerLimit { kind: EventKind, limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type ListenerFn = Box<dyn FnMut(&Event, &mut EventEmitter<'_>)>;

struct Listener {
    id: ListenerId,
    callback: ListenerFn,
}

#[derive(Debug, Default)]
struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    fn push(&mut self, event: Event) -> Result<(), EventBusError> {
        if self.events.len() >= EVENT_QUEUE_CAPACITY {
            return Err(EventBusError::QueueFull {
                kind: event.kind,
                capacity: EVENT_QUEUE_CAPACITY,
            });
        }
        self.events.push_back(event);
        Ok(())
    }
}

/// Handle given to listeners during a flush. Events emitted through it are
/// queued behind the current snapshot.
pub struct EventEmitter<'a> {
    queue: &'a mut EventQueue,
}

impl EventEmitter<'_> {
    pub fn emit(&mut self, event: Event) -> Result<(), EventBusError> {
        self.queue.push(event)
    }
}

pub struct EventBus {
    queue: EventQueue,
    listeners: [Vec<Listener>; EVENT_KIND_COUNT],
    next_listener_id: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            queue: EventQueue::default(),
            listeners: std::array::from_fn(|_| Vec::new()),
            next_listener_id: 0,
        }
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F) -> Result<ListenerId, EventBusError>
    where
        F: FnMut(&Event, &mut EventEmitter<'_>) + 'static,
    {
        let list = &mut self.listeners[kind.index()];
        if list.len() >= MAX_LISTENERS_PER_KIND {
            return Err(EventBusError::ListenerLimit {
                kind,
                limit: MAX_LISTENERS_PER_KIND,
            });
        }
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        list.push(Listener {
            id,
            callback: Box::new(callback),
        });
        Ok(id)
    }

    /// Removes a listener, keeping the remaining listeners in subscription order.
    pub fn unsubscribe(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let list = &mut self.listeners[kind.index()];
        match list.iter().position(|listener| listener.id == id) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners[kind.index()].len()
    }

    pub fn emit(&mut self, event: Event) -> Result<(), EventBusError> {
        self.queue.push(event)
    }

    /// Emits and logs a dropped event instead of returning the error.
    pub fn emit_or_drop(&mut self, event: Event) {
        if let Err(error) = self.emit(event) {
            warn!(error = %error, "event_dropped");
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.events.len()
    }

    /// Dispatches the events queued at entry and returns how many were dispatched.
    pub fn flush(&mut self) -> usize {
        let snapshot = self.queue.events.len();
        let Self {
            queue, listeners, ..
        } = self;

        for _ in 0..snapshot {
            let Some(event) = queue.events.pop_front() else {
                break;
            };
            let mut emitter = EventEmitter { queue: &mut *queue };
            for listener in listeners[event.kind.index()].iter_mut() {
                (listener.callback)(&event, &mut emitter);
            }
        }

        if snapshot > 0 {
            debug!(dispatched = snapshot, deferred = self.pending(), "event_flush");
        }
        snapshot
    }

    /// Discards queued events without dispatching them.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.events.len();
        self.queue.events.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recorder(bus: &mut EventBus, kind: EventKind) -> (ListenerId, Rc<RefCell<Vec<Event>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = bus
            .subscribe(kind, move |event, _| sink.borrow_mut().push(event.clone()))
            .expect("subscribe");
        (id, seen)
    }

    #[test]
    fn flush_dispatches_only_the_snapshot_taken_at_entry() {
        let mut bus = EventBus::new();
        let (_, seen) = recorder(&mut bus, EventKind::Interact);
        bus.subscribe(EventKind::Interact, |event, emitter| {
            if event.subject == 3 {
                emitter
                    .emit(Event::new(EventKind::Interact).with_subject(4))
                    .expect("room in queue");
            }
        })
        .expect("subscribe");

        for subject in 1..=3 {
            bus.emit(Event::new(EventKind::Interact).with_subject(subject))
                .expect("emit");
        }

        assert_eq!(bus.flush(), 3);
        let subjects: Vec<i32> = seen.borrow().iter().map(|event| event.subject).collect();
        assert_eq!(subjects, vec![1, 2, 3]);
        assert_eq!(bus.pending(), 1);

        assert_eq!(bus.flush(), 1);
        assert_eq!(seen.borrow().last().map(|event| event.subject), Some(4));
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn self_emitting_listener_does_not_loop_within_one_flush() {
        let mut bus = EventBus::new();
        let calls = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&calls);
        bus.subscribe(EventKind::ZoneEnter, move |event, emitter| {
            *counter.borrow_mut() += 1;
            let _ = emitter.emit(event.clone());
        })
        .expect("subscribe");

        bus.emit(Event::new(EventKind::ZoneEnter)).expect("emit");
        for expected in 1..=5 {
            bus.flush();
            assert_eq!(*calls.borrow(), expected);
        }
    }

    #[test]
    fn listeners_run_in_subscription_order_and_only_for_their_kind() {
        let mut bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            bus.subscribe(EventKind::DialogStart, move |_, _| order.borrow_mut().push(tag))
                .expect("subscribe");
        }
        let (_, other) = recorder(&mut bus, EventKind::DialogEnd);

        bus.emit(Event::new(EventKind::DialogStart)).expect("emit");
        bus.flush();

        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
        assert!(other.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_preserves_relative_order() {
        let mut bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut ids = Vec::new();
        for tag in ["a", "b", "c", "d"] {
            let order = Rc::clone(&order);
            ids.push(
                bus.subscribe(EventKind::Interact, move |_, _| order.borrow_mut().push(tag))
                    .expect("subscribe"),
            );
        }

        assert!(bus.unsubscribe(EventKind::Interact, ids[1]));
        assert!(!bus.unsubscribe(EventKind::Interact, ids[1]));
        assert!(!bus.unsubscribe(EventKind::ZoneExit, ids[2]));

        bus.emit(Event::new(EventKind::Interact)).expect("emit");
        bus.flush();
        assert_eq!(*order.borrow(), vec!["a", "c", "d"]);
        assert_eq!(bus.listener_count(EventKind::Interact), 3);
    }

    #[test]
    fn listener_limit_is_reported_and_list_unchanged() {
        let mut bus = EventBus::new();
        for _ in 0..MAX_LISTENERS_PER_KIND {
            bus.subscribe(EventKind::Interact, |_, _| {}).expect("subscribe");
        }

        let err = bus
            .subscribe(EventKind::Interact, |_, _| {})
            .expect_err("limit");
        assert_eq!(
            err,
            EventBusError::ListenerLimit {
                kind: EventKind::Interact,
                limit: MAX_LISTENERS_PER_KIND
            }
        );
        assert_eq!(bus.listener_count(EventKind::Interact), MAX_LISTENERS_PER_KIND);
        assert!(bus.subscribe(EventKind::ZoneEnter, |_, _| {}).is_ok());
    }

    #[test]
    fn full_queue_drops_new_events() {
        let mut bus = EventBus::new();
        let (_, seen) = recorder(&mut bus, EventKind::CollisionEnter);
        for subject in 0..EVENT_QUEUE_CAPACITY as i32 {
            bus.emit(Event::new(EventKind::CollisionEnter).with_subject(subject))
                .expect("emit");
        }

        let err = bus
            .emit(Event::new(EventKind::CollisionEnter).with_subject(-1))
            .expect_err("full");
        assert!(matches!(err, EventBusError::QueueFull { .. }));
        bus.emit_or_drop(Event::new(EventKind::CollisionEnter).with_subject(-2));

        assert_eq!(bus.flush(), EVENT_QUEUE_CAPACITY);
        assert!(seen.borrow().iter().all(|event| event.subject >= 0));
    }

    #[test]
    fn clear_discards_without_dispatch() {
        let mut bus = EventBus::new();
        let (_, seen) = recorder(&mut bus, EventKind::SceneEntered);
        bus.emit(Event::scene_entered(SceneId::Overworld)).expect("emit");
        bus.emit(Event::scene_entered(SceneId::Battle)).expect("emit");

        assert_eq!(bus.clear(), 2);
        assert_eq!(bus.flush(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn scene_entered_carries_scene_as_subject_and_payload() {
        let event = Event::scene_entered(SceneId::Battle);
        assert_eq!(event.kind, EventKind::SceneEntered);
        assert_eq!(event.subject, SceneId::Battle.index() as i32);
        assert_eq!(event.payload, EventPayload::Scene(SceneId::Battle));
    }
}

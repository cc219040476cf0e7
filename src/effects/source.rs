//! External event sources.
//!
//! A state subscribes to an [`EventSource`] for a list of event names. The
//! source forwards matching events into the machine through an [`EventSink`]
//! until the subscribing node's [`CancellationToken`] fires.

use super::cancel::CancellationToken;
use crate::core::Event;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Anything a state can subscribe to.
pub trait EventSource {
    /// Forward events named in `events` into `sink` until `token` fires.
    fn subscribe(&self, events: &[String], sink: EventSink, token: &CancellationToken);
}

/// Entry point for events produced outside a dispatch step.
///
/// Sinks are cheap to clone. A machine hands out sinks that queue events when
/// the machine is busy and drop them once the machine is gone.
#[derive(Clone)]
pub struct EventSink {
    deliver: Rc<dyn Fn(Event)>,
}

impl EventSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(Event) + 'static,
    {
        Self {
            deliver: Rc::new(deliver),
        }
    }

    pub fn send(&self, event: impl Into<Event>) {
        (self.deliver)(event.into())
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventSink(..)")
    }
}

struct Listener {
    id: u64,
    events: Vec<String>,
    sink: EventSink,
    token: CancellationToken,
}

#[derive(Default)]
struct Listeners {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Listener>>,
}

/// In-process event bus.
///
/// Subscriptions are removed as soon as their token fires.
///
/// # Example
///
/// ```rust
/// use hierarch::core::Event;
/// use hierarch::effects::{CancellationToken, EventBus, EventSink, EventSource};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let bus = EventBus::new();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = seen.clone();
/// let token = CancellationToken::new();
/// bus.subscribe(
///     &["keydown".to_string()],
///     EventSink::new(move |event: Event| log.borrow_mut().push(event.name)),
///     &token,
/// );
///
/// bus.emit("keydown");
/// bus.emit("keyup");
/// token.cancel();
/// bus.emit("keydown");
///
/// assert_eq!(*seen.borrow(), vec!["keydown".to_string()]);
/// assert_eq!(bus.listener_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Rc<Listeners>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live listener registered for its name.
    pub fn emit(&self, event: impl Into<Event>) {
        let event = event.into();
        let sinks: Vec<EventSink> = {
            let mut entries = self.listeners.entries.borrow_mut();
            entries.retain(|listener| !listener.token.is_cancelled());
            entries
                .iter()
                .filter(|listener| listener.events.iter().any(|name| *name == event.name))
                .map(|listener| listener.sink.clone())
                .collect()
        };
        for sink in sinks {
            sink.send(event.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .entries
            .borrow()
            .iter()
            .filter(|listener| !listener.token.is_cancelled())
            .count()
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, events: &[String], sink: EventSink, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        let id = self.listeners.next_id.get();
        self.listeners.next_id.set(id + 1);
        self.listeners.entries.borrow_mut().push(Listener {
            id,
            events: events.to_vec(),
            sink,
            token: token.clone(),
        });

        let listeners = Rc::downgrade(&self.listeners);
        token.on_cancel(move || {
            if let Some(listeners) = listeners.upgrade() {
                if let Ok(mut entries) = listeners.entries.try_borrow_mut() {
                    entries.retain(|listener| listener.id != id);
                }
            }
        });
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (EventSink, Rc<RefCell<Vec<String>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        (
            EventSink::new(move |event: Event| log.borrow_mut().push(event.name)),
            seen,
        )
    }

    #[test]
    fn only_named_events_are_forwarded() {
        let bus = EventBus::new();
        let (sink, seen) = recorder();
        let token = CancellationToken::new();
        bus.subscribe(&["a".to_string(), "b".to_string()], sink, &token);

        bus.emit("a");
        bus.emit("c");
        bus.emit("b");
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn cancelled_token_removes_listener() {
        let bus = EventBus::new();
        let (sink, seen) = recorder();
        let token = CancellationToken::new();
        bus.subscribe(&["a".to_string()], sink, &token);
        assert_eq!(bus.listener_count(), 1);

        token.cancel();
        bus.emit("a");
        assert!(seen.borrow().is_empty());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn subscribing_with_fired_token_is_ignored() {
        let bus = EventBus::new();
        let (sink, _) = recorder();
        let token = CancellationToken::new();
        token.cancel();

        bus.subscribe(&["a".to_string()], sink, &token);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn sink_may_emit_on_same_bus() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let token = CancellationToken::new();

        let echo_bus = bus.clone();
        let log = seen.clone();
        bus.subscribe(
            &["ping".to_string(), "pong".to_string()],
            EventSink::new(move |event: Event| {
                log.borrow_mut().push(event.name.clone());
                if event.is("ping") {
                    echo_bus.emit("pong");
                }
            }),
            &token,
        );

        bus.emit("ping");
        assert_eq!(*seen.borrow(), vec!["ping", "pong"]);
    }
}

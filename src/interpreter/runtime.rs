//! Services shared by every node of one machine.

use crate::builder::Chart;
use crate::core::{Context, Event};
use crate::effects::{CancellationToken, Deferred, EventSink};
use crate::interpreter::notify::{Notification, Notifier};
use crate::interpreter::options::StartOptions;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use uuid::Uuid;

/// Effect results waiting to be armed at the end of the current step.
pub(crate) struct Watch {
    pub(crate) state: String,
    pub(crate) token: CancellationToken,
    pub(crate) result: Deferred,
}

pub(crate) struct Runtime {
    pub(crate) chart: Chart,
    pub(crate) options: StartOptions,
    pub(crate) machine: Uuid,
    pub(crate) notifier: Notifier,
    counter: Cell<u64>,
    active_event: RefCell<Option<Rc<Event>>>,
    watches: RefCell<Vec<Watch>>,
    /// Notifications raised while the tree is borrowed, published once the
    /// step releases it.
    outbox: RefCell<Vec<Notification>>,
    sink: EventSink,
}

impl Runtime {
    pub(crate) fn new(chart: Chart, options: StartOptions, machine: Uuid, sink: EventSink) -> Self {
        Self {
            chart,
            options,
            machine,
            notifier: Notifier::default(),
            counter: Cell::new(0),
            active_event: RefCell::new(None),
            watches: RefCell::new(Vec::new()),
            outbox: RefCell::new(Vec::new()),
            sink,
        }
    }

    pub(crate) fn change(&self) -> u64 {
        self.counter.get()
    }

    /// Advance the change counter, returning the new value.
    pub(crate) fn bump(&self) -> u64 {
        let next = self.counter.get() + 1;
        self.counter.set(next);
        next
    }

    pub(crate) fn reset_counter(&self) {
        self.counter.set(0);
    }

    pub(crate) fn publish(&self, notification: &Notification) {
        self.notifier.publish(notification);
    }

    /// Queue a notification raised by a node.
    pub(crate) fn notify(&self, notification: Notification) {
        self.outbox.borrow_mut().push(notification);
    }

    /// Publish every queued notification in the order it was raised.
    pub(crate) fn flush(&self) {
        let queued = std::mem::take(&mut *self.outbox.borrow_mut());
        for notification in &queued {
            self.notifier.publish(notification);
        }
    }

    pub(crate) fn set_active_event(&self, event: Option<Event>) {
        *self.active_event.borrow_mut() = event.map(Rc::new);
    }

    pub(crate) fn active_event(&self) -> Option<Rc<Event>> {
        self.active_event.borrow().clone()
    }

    pub(crate) fn context<'a>(&'a self, event: Option<&'a Event>) -> Context<'a> {
        Context::new(event, self.options.context.as_deref())
    }

    pub(crate) fn watch(&self, watch: Watch) {
        self.watches.borrow_mut().push(watch);
    }

    pub(crate) fn take_watches(&self) -> Vec<Watch> {
        std::mem::take(&mut *self.watches.borrow_mut())
    }

    pub(crate) fn sink(&self) -> EventSink {
        self.sink.clone()
    }
}

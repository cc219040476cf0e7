//! Observer notifications.

use crate::core::StateValue;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Change published to machine observers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A node was entered or its primitive child was mapped. `state` is the
    /// shape rooted at that node.
    StateChanged { change: u64, state: StateValue },
    /// An accumulation buffer received an event.
    AccumulationsChanged { buffer: String },
    /// The machine was torn down.
    Aborted,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&Notification)>;

#[derive(Default)]
pub(crate) struct Notifier {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
}

impl Notifier {
    pub(crate) fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Notification) + 'static,
    {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    /// Call every listener subscribed at the time of publishing. Listeners may
    /// subscribe or unsubscribe while being called.
    pub(crate) fn publish(&self, notification: &Notification) {
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listeners_receive_in_subscription_order() {
        let notifier = Notifier::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        for label in ["a", "b"] {
            let log = log.clone();
            notifier.subscribe(move |_| log.borrow_mut().push(label));
        }

        notifier.publish(&Notification::Aborted);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let notifier = Notifier::default();
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let id = notifier.subscribe(move |_| seen.set(seen.get() + 1));

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.publish(&Notification::Aborted);
        assert_eq!(count.get(), 0);
        assert!(notifier.listeners.borrow().is_empty());
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let notifier = Rc::new(Notifier::default());
        let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let count = Rc::new(Cell::new(0));

        let handle = notifier.clone();
        let own = slot.clone();
        let seen = count.clone();
        let id = notifier.subscribe(move |_| {
            seen.set(seen.get() + 1);
            if let Some(id) = own.get() {
                handle.unsubscribe(id);
            }
        });
        slot.set(Some(id));

        notifier.publish(&Notification::Aborted);
        notifier.publish(&Notification::Aborted);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn notifications_serialize_with_kind() {
        let notification = Notification::StateChanged {
            change: 2,
            state: StateValue::state("On"),
        };
        assert_eq!(
            serde_json::to_value(&notification).unwrap(),
            serde_json::json!({"kind": "state_changed", "change": 2, "state": "On"})
        );
    }
}

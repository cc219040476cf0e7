//! Read-only context visible to descriptors and guards.

use super::event::Event;
use serde_json::Value;

/// Caller-supplied lookup for named context values.
pub type ContextReader = dyn Fn(&str) -> Option<Value>;

/// Values a descriptor or guard may read while it is evaluated.
///
/// The name `"event"` is built in and yields the event currently being
/// dispatched. All other names are answered by the reader configured with
/// [`StartOptions::context`](crate::interpreter::StartOptions::context).
#[derive(Clone, Copy)]
pub struct Context<'a> {
    event: Option<&'a Event>,
    reader: Option<&'a ContextReader>,
}

impl<'a> Context<'a> {
    pub fn new(event: Option<&'a Event>, reader: Option<&'a ContextReader>) -> Self {
        Self { event, reader }
    }

    /// Context with no active event and no reader.
    pub fn empty() -> Self {
        Self {
            event: None,
            reader: None,
        }
    }

    /// The event being dispatched, if evaluation happens inside a dispatch.
    pub fn event(&self) -> Option<&'a Event> {
        self.event
    }

    pub fn read(&self, name: &str) -> Option<Value> {
        if name == "event" {
            return self.event.and_then(|event| serde_json::to_value(event).ok());
        }
        self.reader.and_then(|reader| reader(name))
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("event", &self.event)
            .field("reader", &self.reader.is_some())
            .finish()
    }
}

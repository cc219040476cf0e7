//! Events dispatched into a running machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A named event with an optional JSON payload.
///
/// Handlers match on the name only. The payload travels with the event and is
/// visible to descriptors through [`Scope::event`](crate::builder::Scope::event)
/// and to guards through [`Context::event`](crate::core::Context::event).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event::new(name)
    }
}

impl From<&String> for Event {
    fn from(name: &String) -> Self {
        Event::new(name.as_str())
    }
}

//! What an entry effect hands back to the interpreter.

use super::deferred::{Deferred, EffectError, Outcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Message forwarded by a `Send` entry effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Message {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// Object created by an entry effect that later `Send` effects can address.
pub trait MessageTarget {
    fn deliver(&self, message: &Message);
}

/// Result of running one entry effect.
///
/// Most effects only produce a result. Effects that create something a
/// later state wants to talk to also attach a [`MessageTarget`].
#[derive(Clone)]
pub struct EffectOutput {
    pub result: Deferred,
    pub receiver: Option<Rc<dyn MessageTarget>>,
}

impl EffectOutput {
    pub fn new(result: Deferred) -> Self {
        Self {
            result,
            receiver: None,
        }
    }

    pub fn with_receiver(mut self, receiver: Rc<dyn MessageTarget>) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

impl From<()> for EffectOutput {
    fn from(_: ()) -> Self {
        EffectOutput::new(Deferred::resolved(Value::Null))
    }
}

impl From<Deferred> for EffectOutput {
    fn from(result: Deferred) -> Self {
        EffectOutput::new(result)
    }
}

impl From<Value> for EffectOutput {
    fn from(value: Value) -> Self {
        EffectOutput::new(Deferred::resolved(value))
    }
}

impl From<Outcome> for EffectOutput {
    fn from(outcome: Outcome) -> Self {
        EffectOutput::new(Deferred::settled(outcome))
    }
}

impl From<EffectError> for EffectOutput {
    fn from(error: EffectError) -> Self {
        EffectOutput::new(Deferred::rejected(error))
    }
}

impl fmt::Debug for EffectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOutput")
            .field("result", &self.result)
            .field("receiver", &self.receiver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<Message>>);

    impl MessageTarget for Recorder {
        fn deliver(&self, message: &Message) {
            self.0.borrow_mut().push(message.clone());
        }
    }

    #[test]
    fn unit_output_resolves_to_null() {
        let output = EffectOutput::from(());
        assert_eq!(output.result.outcome(), Some(Ok(Value::Null)));
        assert!(output.receiver.is_none());
    }

    #[test]
    fn outcome_output_keeps_failure() {
        let output = EffectOutput::from(Err::<Value, _>(EffectError::new("bad")));
        assert_eq!(output.result.outcome(), Some(Err(EffectError::new("bad"))));
    }

    #[test]
    fn receiver_is_attached() {
        let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));
        let output = EffectOutput::from(json!(1)).with_receiver(recorder.clone());

        let receiver = output.receiver.unwrap();
        receiver.deliver(&Message::new("focus", vec![]));
        assert_eq!(recorder.0.borrow()[0].method, "focus");
    }
}

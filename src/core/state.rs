//! State identity and state shape values.
//!
//! A [`StateId`] is the identity of a state descriptor inside a chart. The
//! interpreter never compares descriptors by name, only by handle. A
//! [`StateValue`] is the observable shape of the active path, and a
//! [`Primitive`] is a bare leaf value a state can hold instead of a nested
//! state.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Handle of a state descriptor declared on a chart.
///
/// Handles are cheap to copy and compare. Two handles are equal exactly when
/// they name the same declared descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) u32);

impl StateId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A leaf value held by a state in place of a nested state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    Bool(bool),
    Number(f64),
    Text(String),
    /// Symbolic value. Serializes like text but is kept distinct in memory.
    Token(String),
}

impl Primitive {
    pub fn token(name: impl Into<String>) -> Self {
        Primitive::Token(name.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Primitive::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Primitive::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Primitive::Text(value) | Primitive::Token(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool(value) => write!(f, "{value}"),
            Primitive::Number(value) => write!(f, "{value}"),
            Primitive::Text(value) => write!(f, "{value:?}"),
            Primitive::Token(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::Bool(value)
    }
}

impl From<f64> for Primitive {
    fn from(value: f64) -> Self {
        Primitive::Number(value)
    }
}

impl From<i32> for Primitive {
    fn from(value: i32) -> Self {
        Primitive::Number(f64::from(value))
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::Text(value.to_string())
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Primitive::Text(value)
    }
}

/// Observable shape of the active state path.
///
/// A state without a child renders as its name, a state holding a primitive
/// renders as `{name: primitive}` and a state holding a nested state renders
/// as `{name: <nested shape>}`.
///
/// # Example
///
/// ```rust
/// use hierarch::core::StateValue;
///
/// let walking = StateValue::nested("red", StateValue::state("walk"));
///
/// assert_eq!(walking.to_string(), "red.walk");
/// assert_eq!(serde_json::to_value(&walking).unwrap(), serde_json::json!({"red": "walk"}));
/// assert!(walking.is_in("walk"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum StateValue {
    /// A state with no child.
    State(String),
    /// A bare primitive at the top of the machine.
    Value(Primitive),
    /// A named state and the shape of its child.
    Nested(String, Box<StateValue>),
}

impl StateValue {
    pub fn state(name: impl Into<String>) -> Self {
        StateValue::State(name.into())
    }

    pub fn value(value: impl Into<Primitive>) -> Self {
        StateValue::Value(value.into())
    }

    pub fn nested(name: impl Into<String>, inner: StateValue) -> Self {
        StateValue::Nested(name.into(), Box::new(inner))
    }

    /// Name of the outermost state, if the shape starts with one.
    pub fn name(&self) -> Option<&str> {
        match self {
            StateValue::State(name) | StateValue::Nested(name, _) => Some(name),
            StateValue::Value(_) => None,
        }
    }

    /// Names along the path, outermost first.
    pub fn path(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                StateValue::State(name) => {
                    names.push(name.as_str());
                    return names;
                }
                StateValue::Value(_) => return names,
                StateValue::Nested(name, inner) => {
                    names.push(name.as_str());
                    cursor = inner;
                }
            }
        }
    }

    /// Leaf primitive at the bottom of the path, if any.
    pub fn leaf(&self) -> Option<&Primitive> {
        match self {
            StateValue::State(_) => None,
            StateValue::Value(value) => Some(value),
            StateValue::Nested(_, inner) => inner.leaf(),
        }
    }

    /// True if a state called `name` is anywhere on the path.
    pub fn is_in(&self, name: &str) -> bool {
        self.path().contains(&name)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::State(name) => write!(f, "{name}"),
            StateValue::Value(value) => write!(f, "{value}"),
            StateValue::Nested(name, inner) => write!(f, "{name}.{inner}"),
        }
    }
}

impl Serialize for StateValue {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        match self {
            StateValue::State(name) => serializer.serialize_str(name),
            StateValue::Value(value) => value.serialize(serializer),
            StateValue::Nested(name, inner) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, inner.as_ref())?;
                map.end()
            }
        }
    }
}

impl From<&str> for StateValue {
    fn from(name: &str) -> Self {
        StateValue::state(name)
    }
}

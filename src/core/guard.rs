//! Guard predicates for conditional transitions and choices.
//!
//! Guards are pure boolean functions over the evaluation [`Context`]. They
//! decide whether a `Cond` target fires and which arm of a choice map is
//! taken.

use super::context::Context;
use std::fmt;
use std::rc::Rc;

/// Pure predicate evaluated against the current context.
///
/// # Example
///
/// ```rust
/// use hierarch::core::{Context, Event, Guard};
///
/// let is_escape = Guard::new(|ctx: &Context<'_>| {
///     ctx.event().map(|event| event.payload["key"] == "Escape").unwrap_or(false)
/// });
///
/// let escape = Event::with_payload("keydown", serde_json::json!({"key": "Escape"}));
/// let enter = Event::with_payload("keydown", serde_json::json!({"key": "Enter"}));
///
/// assert!(is_escape.check(&Context::new(Some(&escape), None)));
/// assert!(!is_escape.check(&Context::new(Some(&enter), None)));
/// assert!(!is_escape.check(&Context::empty()));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Rc<dyn Fn(&Context<'_>) -> bool>,
}

impl Guard {
    /// Create a guard from a predicate.
    ///
    /// The predicate should be deterministic for a given context. It may be
    /// evaluated more than once per dispatch.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context<'_>) -> bool + 'static,
    {
        Guard {
            predicate: Rc::new(predicate),
        }
    }

    /// Guard with a fixed answer.
    pub fn constant(value: bool) -> Self {
        Guard::new(move |_| value)
    }

    pub fn check(&self, context: &Context<'_>) -> bool {
        (self.predicate)(context)
    }

    /// Guard that passes when `self` fails.
    pub fn not(self) -> Self {
        Guard::new(move |ctx| !self.check(ctx))
    }
}

impl From<bool> for Guard {
    fn from(value: bool) -> Self {
        Guard::constant(value)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

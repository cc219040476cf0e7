//! The statechart interpreter.
//!
//! [`start`] turns a [`Chart`](crate::builder::Chart) into a running
//! [`Machine`]. The machine keeps a chain of live nodes, one per nesting
//! level, and dispatches events into it:
//!
//! 1. The deepest active state sees the event first.
//! 2. If nothing in its subtree handles the event, it bubbles to the parent.
//! 3. A matched `on` target replaces the whole subtree of the node that
//!    registered it. Choice, jump and mapper targets act in place.
//!
//! Entry effects run synchronously while a state is entered. Their deferred
//! results are merged per node and, once settled, come back into the machine
//! as `SUCCESS` or `FAILURE` events unless the machine has moved on.

mod error;
mod evaluate;
mod machine;
mod node;
mod notify;
mod options;
mod registry;
mod runtime;
mod snapshot;

pub use error::InterpreterError;
pub use machine::{start, Machine};
pub use notify::{ListenerId, Notification};
pub use options::{StartOptions, DEFAULT_FAILURE_EVENT, DEFAULT_MAX_DEPTH, DEFAULT_SUCCESS_EVENT};
pub use snapshot::Snapshot;

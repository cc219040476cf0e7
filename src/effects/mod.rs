//! The imperative shell around the statechart core.
//!
//! Entry effects, cancellation and external event sources are isolated here:
//!
//! - **Deferred results**: settle-once values produced by entry effects
//! - **Aggregation**: merging a node's effect results into one record
//! - **Cancellation**: tokens that scope subscriptions and effects to a node
//! - **Event sources**: the subscription seam and an in-process bus
//!
//! Everything is single-threaded. Shared state lives behind `Rc` and
//! `RefCell`, and no type here is `Send`.

mod aggregate;
mod cancel;
mod deferred;
mod output;
mod source;

pub use aggregate::{all, merge, Aggregator};
pub use cancel::CancellationToken;
pub use deferred::{Deferred, EffectError, Outcome, Settler};
pub use output::{EffectOutput, Message, MessageTarget};
pub use source::{EventBus, EventSink, EventSource};

//! Core statechart vocabulary.
//!
//! This module holds the pure building blocks the interpreter works with:
//! - State identity ([`StateId`]) and observable shapes ([`StateValue`])
//! - Events and the read-only evaluation [`Context`]
//! - Guard predicates and choice maps
//! - The directive protocol emitted by state descriptors
//! - Immutable transition history
//!
//! Nothing in here performs side effects. Effects, cancellation and event
//! sources live in [`crate::effects`].

mod context;
mod directive;
mod event;
mod guard;
mod history;
mod state;

pub use context::{Context, ContextReader};
pub use directive::{
    ChoiceArm, ChoiceMap, Completion, Cond, Directive, EffectFn, EntryEffect, ExitEffect, Mapper,
    Target,
};
pub use event::Event;
pub use guard::Guard;
pub use history::{TransitionHistory, TransitionRecord};
pub use state::{Primitive, StateId, StateValue};

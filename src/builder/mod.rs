//! Builder API for charts and directives.
//!
//! Charts are assembled with [`ChartBuilder`]. Each state is defined by a
//! descriptor closure that receives a [`Scope`] and emits directives into it.
//! The free functions below build the same directives as values, so reusable
//! groups can be shared between descriptors and added with
//! [`Scope::extend`].

pub mod chart;
pub mod error;
pub mod macros;
pub mod scope;

pub use chart::{Chart, ChartBuilder, Descriptor};
pub use error::BuildError;
pub use scope::Scope;

use crate::core::{
    ChoiceMap, Cond, Directive, EffectFn, EntryEffect, ExitEffect, Guard, Mapper, Primitive,
    StateId, Target,
};
use crate::effects::{CancellationToken, EffectOutput, EventSource, Message};
use serde_json::Value;
use std::rc::Rc;

/// Handle `event` by resolving `target`.
///
/// # Example
///
/// ```
/// use hierarch::builder::{on, ChartBuilder};
///
/// let mut chart = ChartBuilder::new();
/// let up = chart.declare("up");
/// let down = chart.declare("down");
/// let arrows = move || vec![on("ArrowUp", up), on("ArrowDown", down)];
///
/// chart.define(up, move |s| {
///     s.extend(arrows());
/// });
/// chart.define(down, move |s| {
///     s.extend(arrows());
/// });
/// assert!(chart.build().is_ok());
/// ```
pub fn on(event: impl Into<String>, target: impl Into<Target>) -> Directive {
    Directive::On {
        event: event.into(),
        target: target.into(),
    }
}

/// Named entry effect. Its result joins the node's aggregated result under
/// `name`.
pub fn entry<F, O>(name: impl Into<String>, effect: F) -> Directive
where
    F: Fn(&CancellationToken) -> O + 'static,
    O: Into<EffectOutput>,
{
    Directive::Entry(EntryEffect::Run {
        name: name.into(),
        effect: effect_fn(move |token| effect(token).into()),
    })
}

fn effect_fn<F>(effect: F) -> Rc<EffectFn>
where
    F: Fn(&CancellationToken) -> EffectOutput + 'static,
{
    Rc::new(effect)
}

/// Entry effect that forwards a message to the receiver created by an
/// earlier effect called `receiver`.
pub fn send(receiver: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Directive {
    Directive::Entry(EntryEffect::Send {
        receiver: receiver.into(),
        message: Message::new(method, args),
    })
}

pub fn exit<F>(name: impl Into<String>, effect: F) -> Directive
where
    F: Fn() + 'static,
{
    Directive::Exit(ExitEffect::new(name, effect))
}

/// Forward the named events from `source` while the state is active.
pub fn subscribe<S, I, N>(source: S, events: I) -> Directive
where
    S: EventSource + 'static,
    I: IntoIterator<Item = N>,
    N: Into<String>,
{
    Directive::Subscribe {
        source: Rc::new(source),
        events: events.into_iter().map(Into::into).collect(),
    }
}

/// Append every `event` received while the state is active to `buffer`.
pub fn accumulate(event: impl Into<String>, buffer: impl Into<String>) -> Directive {
    Directive::Accumulate {
        event: event.into(),
        buffer: buffer.into(),
    }
}

pub fn read_context(name: impl Into<String>) -> Directive {
    Directive::ReadContext(name.into())
}

/// Publish `tag` on snapshots while the state is active.
pub fn expose(tag: impl Into<String>) -> Directive {
    Directive::Expose(tag.into())
}

/// Resolve `target` immediately after the state is entered.
pub fn always(target: impl Into<Target>) -> Directive {
    Directive::Always(target.into())
}

/// Replace the state with `target` right after entry if `guard` passes.
pub fn cond(guard: impl Into<Guard>, target: StateId) -> Directive {
    Directive::Cond(Cond {
        guard: guard.into(),
        target,
    })
}

/// Guarded target for `on`: replace the state with `target` if `guard`
/// passes, otherwise let the event keep bubbling.
pub fn when(guard: impl Into<Guard>, target: StateId) -> Target {
    Target::Cond(Cond {
        guard: guard.into(),
        target,
    })
}

/// Move the state's own child to the first matching arm.
pub fn choice(map: ChoiceMap) -> Target {
    Target::Choice(map)
}

/// Replace the state with the first matching arm.
pub fn branch(map: ChoiceMap) -> Target {
    Target::Branch(map)
}

/// Enter each state in turn, one level deeper per step.
pub fn jump_to<I>(targets: I) -> Target
where
    I: IntoIterator<Item = StateId>,
{
    Target::JumpTo(targets.into_iter().collect())
}

/// Transform the state's primitive child in place.
pub fn map<F>(transform: F) -> Target
where
    F: Fn(&Primitive) -> Primitive + 'static,
{
    Target::Mapper(Mapper::new(transform))
}

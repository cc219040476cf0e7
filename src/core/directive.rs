//! The directive protocol.
//!
//! A state descriptor emits an ordered list of [`Directive`]s and then
//! finishes with a [`Completion`]. Directives register handlers on the node
//! being entered. The completion decides what the node holds as its child.
//! Both enums are closed so the interpreter can match them exhaustively.

use super::context::Context;
use super::guard::Guard;
use super::state::{Primitive, StateId};
use crate::effects::{CancellationToken, EffectOutput, EventSource, Message};
use std::fmt;
use std::rc::Rc;

/// Entry effect body. Receives the token of the node that runs it.
pub type EffectFn = dyn Fn(&CancellationToken) -> EffectOutput;

/// Side effect run synchronously when a node is entered.
#[derive(Clone)]
pub enum EntryEffect {
    /// Run a named effect. Its result joins the node's aggregated result
    /// under `name`.
    Run { name: String, effect: Rc<EffectFn> },
    /// Forward a message to the object produced by an earlier `Run` effect
    /// called `receiver`, on this node or an ancestor.
    Send { receiver: String, message: Message },
}

impl EntryEffect {
    pub fn name(&self) -> &str {
        match self {
            EntryEffect::Run { name, .. } => name,
            EntryEffect::Send { receiver, .. } => receiver,
        }
    }
}

impl fmt::Debug for EntryEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryEffect::Run { name, .. } => f.debug_struct("Run").field("name", name).finish(),
            EntryEffect::Send { receiver, message } => f
                .debug_struct("Send")
                .field("receiver", receiver)
                .field("message", message)
                .finish(),
        }
    }
}

/// Side effect run synchronously when a node is torn down.
#[derive(Clone)]
pub struct ExitEffect {
    pub name: String,
    effect: Rc<dyn Fn()>,
}

impl ExitEffect {
    pub fn new<F>(name: impl Into<String>, effect: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            name: name.into(),
            effect: Rc::new(effect),
        }
    }

    pub fn run(&self) {
        (self.effect)()
    }
}

impl fmt::Debug for ExitEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitEffect").field("name", &self.name).finish()
    }
}

/// Guarded jump. When the guard passes, the registering node is replaced by
/// `target`.
#[derive(Clone, Debug)]
pub struct Cond {
    pub guard: Guard,
    pub target: StateId,
}

/// One arm of a choice map. An arm without a guard always matches.
#[derive(Clone, Debug)]
pub struct ChoiceArm {
    pub guard: Option<Guard>,
    pub target: StateId,
}

/// Ordered predicate-to-state table. The first matching arm wins.
///
/// # Example
///
/// ```rust
/// use hierarch::builder::ChartBuilder;
/// use hierarch::core::{ChoiceMap, Context};
///
/// let mut chart = ChartBuilder::new();
/// let open = chart.declare("Open");
/// let closed = chart.declare("Closed");
///
/// let choice = ChoiceMap::new()
///     .when(|ctx: &Context<'_>| ctx.read("open").is_some(), open)
///     .otherwise(closed);
///
/// assert_eq!(choice.select(&Context::empty()), Some(closed));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ChoiceMap {
    arms: Vec<ChoiceArm>,
}

impl ChoiceMap {
    pub fn new() -> Self {
        Self { arms: Vec::new() }
    }

    /// Add an arm taken when `predicate` passes.
    pub fn when<F>(self, predicate: F, target: StateId) -> Self
    where
        F: Fn(&Context<'_>) -> bool + 'static,
    {
        self.when_guard(Guard::new(predicate), target)
    }

    pub fn when_guard(mut self, guard: impl Into<Guard>, target: StateId) -> Self {
        self.arms.push(ChoiceArm {
            guard: Some(guard.into()),
            target,
        });
        self
    }

    /// Add the default arm. It matches whenever it is reached.
    pub fn otherwise(mut self, target: StateId) -> Self {
        self.arms.push(ChoiceArm {
            guard: None,
            target,
        });
        self
    }

    pub fn arms(&self) -> &[ChoiceArm] {
        &self.arms
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    /// Target of the first arm that matches, in insertion order.
    pub fn select(&self, context: &Context<'_>) -> Option<StateId> {
        self.arms
            .iter()
            .find(|arm| arm.guard.as_ref().map_or(true, |guard| guard.check(context)))
            .map(|arm| arm.target)
    }
}

impl FromIterator<(Option<Guard>, StateId)> for ChoiceMap {
    fn from_iter<I: IntoIterator<Item = (Option<Guard>, StateId)>>(iter: I) -> Self {
        Self {
            arms: iter
                .into_iter()
                .map(|(guard, target)| ChoiceArm { guard, target })
                .collect(),
        }
    }
}

/// In-place transform of a primitive leaf.
#[derive(Clone)]
pub struct Mapper(Rc<dyn Fn(&Primitive) -> Primitive>);

impl Mapper {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&Primitive) -> Primitive + 'static,
    {
        Mapper(Rc::new(transform))
    }

    pub fn apply(&self, value: &Primitive) -> Primitive {
        (self.0)(value)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Mapper(..)")
    }
}

/// What a handler does when its event arrives.
#[derive(Clone, Debug)]
pub enum Target {
    /// Replace the registering node with this state.
    State(StateId),
    /// Replace the registering node when the guard passes.
    Cond(Cond),
    /// Move the registering node's own child to the first matching arm.
    Choice(ChoiceMap),
    /// Replace the registering node with the first matching arm.
    Branch(ChoiceMap),
    /// Move the registering node's child into each state in turn, one level
    /// deeper per step.
    JumpTo(Vec<StateId>),
    /// Transform the registering node's primitive child in place.
    Mapper(Mapper),
}

impl From<StateId> for Target {
    fn from(id: StateId) -> Self {
        Target::State(id)
    }
}

impl From<Cond> for Target {
    fn from(cond: Cond) -> Self {
        Target::Cond(cond)
    }
}

impl From<Mapper> for Target {
    fn from(mapper: Mapper) -> Self {
        Target::Mapper(mapper)
    }
}

/// A single instruction emitted by a state descriptor.
#[derive(Clone)]
pub enum Directive {
    On { event: String, target: Target },
    Entry(EntryEffect),
    Exit(ExitEffect),
    Subscribe {
        source: Rc<dyn EventSource>,
        events: Vec<String>,
    },
    Accumulate { event: String, buffer: String },
    ReadContext(String),
    Expose(String),
    Always(Target),
    Cond(Cond),
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::On { event, target } => f
                .debug_struct("On")
                .field("event", event)
                .field("target", target)
                .finish(),
            Directive::Entry(effect) => f.debug_tuple("Entry").field(effect).finish(),
            Directive::Exit(effect) => f.debug_tuple("Exit").field(effect).finish(),
            Directive::Subscribe { events, .. } => {
                f.debug_struct("Subscribe").field("events", events).finish()
            }
            Directive::Accumulate { event, buffer } => f
                .debug_struct("Accumulate")
                .field("event", event)
                .field("buffer", buffer)
                .finish(),
            Directive::ReadContext(name) => f.debug_tuple("ReadContext").field(name).finish(),
            Directive::Expose(tag) => f.debug_tuple("Expose").field(tag).finish(),
            Directive::Always(target) => f.debug_tuple("Always").field(target).finish(),
            Directive::Cond(cond) => f.debug_tuple("Cond").field(cond).finish(),
        }
    }
}

/// How a descriptor finishes, deciding the node's child.
#[derive(Clone, Debug, Default)]
pub enum Completion {
    /// No child.
    #[default]
    Empty,
    /// Enter this state as the child.
    Enter(StateId),
    /// Hold a primitive as the child.
    Leaf(Primitive),
    /// Enter the first matching arm, or nothing if none matches.
    Choose(ChoiceMap),
}

impl From<()> for Completion {
    fn from(_: ()) -> Self {
        Completion::Empty
    }
}

impl From<StateId> for Completion {
    fn from(id: StateId) -> Self {
        Completion::Enter(id)
    }
}

impl From<Option<StateId>> for Completion {
    fn from(id: Option<StateId>) -> Self {
        id.map_or(Completion::Empty, Completion::Enter)
    }
}

impl From<Primitive> for Completion {
    fn from(value: Primitive) -> Self {
        Completion::Leaf(value)
    }
}

impl From<bool> for Completion {
    fn from(value: bool) -> Self {
        Completion::Leaf(Primitive::Bool(value))
    }
}

impl From<f64> for Completion {
    fn from(value: f64) -> Self {
        Completion::Leaf(Primitive::Number(value))
    }
}

impl From<ChoiceMap> for Completion {
    fn from(choice: ChoiceMap) -> Self {
        Completion::Choose(choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_matching_arm_wins() {
        let reader = |name: &str| (name == "flag").then(|| json!(true));
        let context = Context::new(None, Some(&reader));
        let map = ChoiceMap::new()
            .when(|_| false, StateId(0))
            .when(|ctx| ctx.read("flag").is_some(), StateId(1))
            .when(|_| true, StateId(2))
            .otherwise(StateId(3));

        assert_eq!(map.select(&context), Some(StateId(1)));
    }

    #[test]
    fn default_arm_matches_when_reached() {
        let map = ChoiceMap::new()
            .when(|_| false, StateId(0))
            .otherwise(StateId(7));

        assert_eq!(map.select(&Context::empty()), Some(StateId(7)));
    }

    #[test]
    fn no_arm_selects_nothing() {
        let map = ChoiceMap::new().when_guard(false, StateId(0));
        assert_eq!(map.select(&Context::empty()), None);
        assert!(ChoiceMap::new().select(&Context::empty()).is_none());
    }

    #[test]
    fn map_collects_from_pairs() {
        let map: ChoiceMap = vec![(Some(Guard::constant(false)), StateId(4)), (None, StateId(5))]
            .into_iter()
            .collect();
        assert_eq!(map.arms().len(), 2);
        assert_eq!(map.select(&Context::empty()), Some(StateId(5)));
    }

    #[test]
    fn mapper_transforms_primitive() {
        let toggle = Mapper::new(|value| Primitive::Bool(!value.as_bool().unwrap_or(false)));
        assert_eq!(toggle.apply(&Primitive::Bool(false)), Primitive::Bool(true));
    }

    #[test]
    fn completion_conversions() {
        assert!(matches!(Completion::from(()), Completion::Empty));
        assert!(matches!(Completion::from(StateId(2)), Completion::Enter(StateId(2))));
        assert!(matches!(Completion::from(None::<StateId>), Completion::Empty));
        assert!(matches!(
            Completion::from(true),
            Completion::Leaf(Primitive::Bool(true))
        ));
    }

    #[test]
    fn exit_effect_runs_body() {
        let count = Rc::new(std::cell::Cell::new(0));
        let seen = count.clone();
        let effect = ExitEffect::new("leave", move || seen.set(seen.get() + 1));

        effect.run();
        effect.run();
        assert_eq!(count.get(), 2);
        assert_eq!(effect.name, "leave");
    }
}

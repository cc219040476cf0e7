//! Instance nodes and transition resolution.
//!
//! The live machine is a chain of nodes. Each node owns exactly one child:
//! nothing, a primitive leaf, or a nested node. Events enter at the root,
//! are offered to the deepest node first and bubble upward until a node's
//! registry resolves them.

use crate::core::{Completion, Event, Mapper, Primitive, StateId, StateValue, Target};
use crate::effects::Deferred;
use crate::interpreter::error::InterpreterError;
use crate::interpreter::evaluate::evaluate;
use crate::interpreter::notify::Notification;
use crate::interpreter::registry::{HandlerRegistry, ReceiverScope};
use crate::interpreter::runtime::{Runtime, Watch};
use std::collections::BTreeMap;
use std::rc::Rc;

pub(crate) enum Child {
    Empty,
    Leaf(Primitive),
    Node(Box<Node>),
}

/// What resolving a target asks of the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Nothing matched. Keep bubbling.
    Ignored,
    /// Handled in place.
    Handled,
    /// The parent must replace this node with the given state.
    Replace(StateId),
}

pub(crate) struct Node {
    state: StateId,
    name: String,
    depth: usize,
    child: Child,
    registry: HandlerRegistry,
    accumulations: BTreeMap<String, Vec<Event>>,
    result: Option<Deferred>,
    last_child_result: Option<Deferred>,
}

impl Node {
    /// Construct the node for `state`: evaluate its descriptor, register its
    /// handlers and build its child. Entry is announced separately by
    /// [`Node::activate`].
    pub(crate) fn enter(
        rt: &Runtime,
        state: StateId,
        depth: usize,
        previous: Option<&Deferred>,
        receivers: Option<Rc<ReceiverScope>>,
    ) -> Result<Node, InterpreterError> {
        let entry = rt
            .chart
            .entry(state)
            .ok_or(InterpreterError::UnknownState(state))?;
        if depth > rt.options.max_depth {
            return Err(InterpreterError::DepthExceeded {
                state: entry.name.clone(),
                limit: rt.options.max_depth,
            });
        }

        let mut node = Node {
            state,
            name: entry.name.clone(),
            depth,
            child: Child::Empty,
            registry: HandlerRegistry::new(receivers),
            accumulations: BTreeMap::new(),
            result: None,
            last_child_result: None,
        };
        node.consume(rt, previous)?;
        Ok(node)
    }

    fn consume(&mut self, rt: &Runtime, previous: Option<&Deferred>) -> Result<(), InterpreterError> {
        let event = rt.active_event();
        let context = rt.context(event.as_deref());
        let evaluation = evaluate(&rt.chart, self.state, context)?;

        for directive in evaluation.directives {
            self.registry.add(directive, &self.name);
        }

        self.result = self.registry.take_batch().chain_after(previous);
        if let Some(result) = &self.result {
            rt.watch(Watch {
                state: self.name.clone(),
                token: self.registry.token().clone(),
                result: result.clone(),
            });
        }
        self.registry.subscribe_all(&rt.sink());

        match evaluation.completion {
            Completion::Empty => {}
            Completion::Leaf(value) => self.child = Child::Leaf(value),
            Completion::Enter(target) => self.transition_to(rt, target)?,
            Completion::Choose(choice) => {
                if let Some(target) = choice.select(&context) {
                    self.transition_to(rt, target)?;
                }
            }
        }
        Ok(())
    }

    /// Announce entry, then resolve the node's always-list. The first target
    /// that resolves wins.
    pub(crate) fn activate(&mut self, rt: &Runtime) -> Result<Resolution, InterpreterError> {
        let change = rt.bump();
        tracing::debug!(machine = %rt.machine, state = %self.name, change, "entered state");
        rt.notify(Notification::StateChanged {
            change,
            state: self.project(),
        });

        for target in self.registry.always().to_vec() {
            match self.process_target(rt, &target)? {
                Resolution::Ignored => continue,
                resolution => return Ok(resolution),
            }
        }
        Ok(Resolution::Ignored)
    }

    /// Replace this node's child with a fresh node for `target`.
    /// Re-targeting the current child is a no-op.
    ///
    /// A child whose always-list resolves to a sibling is replaced in turn.
    /// More than `max_depth` such hops in a row is an [`InterpreterError::AlwaysLoop`].
    pub(crate) fn transition_to(&mut self, rt: &Runtime, target: StateId) -> Result<(), InterpreterError> {
        let limit = rt.options.max_depth;
        let mut target = target;
        let mut hops = 0;
        loop {
            if let Child::Node(current) = &self.child {
                if current.state == target {
                    tracing::trace!(state = %current.name, "already active; transition skipped");
                    return Ok(());
                }
            }

            if let Child::Node(mut outgoing) = std::mem::replace(&mut self.child, Child::Empty) {
                outgoing.teardown(rt);
            }

            let mut child = Node::enter(
                rt,
                target,
                self.depth + 1,
                self.last_child_result.as_ref(),
                Some(self.registry.receivers().clone()),
            )?;
            if child.result.is_some() {
                self.last_child_result = child.result.clone();
            }
            let resolution = child.activate(rt)?;
            let name = child.name.clone();
            self.child = Child::Node(Box::new(child));

            let Resolution::Replace(next) = resolution else {
                return Ok(());
            };
            hops += 1;
            if hops > limit {
                return Err(InterpreterError::AlwaysLoop { state: name, limit });
            }
            target = next;
        }
    }

    /// Offer `event` to the subtree rooted here.
    pub(crate) fn receive(&mut self, rt: &Runtime, event: &Event) -> Result<Resolution, InterpreterError> {
        let mut resolution = Resolution::Ignored;

        if let Child::Node(child) = &mut self.child {
            match child.receive(rt, event)? {
                Resolution::Replace(target) => {
                    self.transition_to(rt, target)?;
                    resolution = Resolution::Handled;
                }
                Resolution::Handled => resolution = Resolution::Handled,
                Resolution::Ignored => {}
            }
        }

        if resolution == Resolution::Ignored {
            if let Some(target) = self.registry.target_for(&event.name).cloned() {
                resolution = self.process_target(rt, &target)?;
            }
        }

        let leaving = matches!(resolution, Resolution::Replace(target) if target != self.state)
            && self.depth > 0;
        if !leaving {
            self.accumulate(rt, event);
        }
        Ok(resolution)
    }

    fn process_target(&mut self, rt: &Runtime, target: &Target) -> Result<Resolution, InterpreterError> {
        let event = rt.active_event();
        let context = rt.context(event.as_deref());

        match target {
            Target::State(id) => Ok(Resolution::Replace(*id)),
            Target::Cond(cond) => Ok(if cond.guard.check(&context) {
                Resolution::Replace(cond.target)
            } else {
                Resolution::Ignored
            }),
            Target::Branch(choice) => Ok(choice
                .select(&context)
                .map_or(Resolution::Ignored, Resolution::Replace)),
            Target::Choice(choice) => match choice.select(&context) {
                Some(next) => {
                    self.transition_to(rt, next)?;
                    Ok(Resolution::Handled)
                }
                None => Ok(Resolution::Ignored),
            },
            Target::JumpTo(sequence) => {
                if sequence.is_empty() {
                    return Ok(Resolution::Ignored);
                }
                self.jump(rt, sequence)?;
                Ok(Resolution::Handled)
            }
            Target::Mapper(mapper) => self.apply_mapper(rt, mapper),
        }
    }

    fn jump(&mut self, rt: &Runtime, sequence: &[StateId]) -> Result<(), InterpreterError> {
        let Some((first, rest)) = sequence.split_first() else {
            return Ok(());
        };
        self.transition_to(rt, *first)?;
        match &mut self.child {
            Child::Node(child) if !rest.is_empty() && !matches!(child.child, Child::Leaf(_)) => {
                child.jump(rt, rest)
            }
            _ => Ok(()),
        }
    }

    fn apply_mapper(&mut self, rt: &Runtime, mapper: &Mapper) -> Result<Resolution, InterpreterError> {
        match &mut self.child {
            Child::Leaf(value) => *value = mapper.apply(value),
            Child::Node(_) => {
                return Err(InterpreterError::UnsupportedMapper {
                    state: self.name.clone(),
                    found: "a nested state",
                })
            }
            Child::Empty => {
                return Err(InterpreterError::UnsupportedMapper {
                    state: self.name.clone(),
                    found: "no child",
                })
            }
        }

        let change = rt.bump();
        tracing::debug!(machine = %rt.machine, state = %self.name, change, "mapped leaf value");
        rt.notify(Notification::StateChanged {
            change,
            state: self.project(),
        });
        Ok(Resolution::Handled)
    }

    fn accumulate(&mut self, rt: &Runtime, event: &Event) {
        let buffers: Vec<String> = self
            .registry
            .buffers_for(&event.name)
            .map(str::to_string)
            .collect();
        for buffer in buffers {
            self.accumulations
                .entry(buffer.clone())
                .or_default()
                .push(event.clone());
            rt.notify(Notification::AccumulationsChanged { buffer });
        }
    }

    /// Tear down the subtree, deepest node first. Exit effects run before the
    /// token fires.
    pub(crate) fn teardown(&mut self, rt: &Runtime) {
        if let Child::Node(child) = &mut self.child {
            child.teardown(rt);
        }
        self.registry.run_exit();
        self.registry.reset();
        self.accumulations.clear();
        tracing::debug!(machine = %rt.machine, state = %self.name, "exited state");
    }

    /// Shape of the subtree rooted here.
    pub(crate) fn project(&self) -> StateValue {
        match &self.child {
            Child::Empty => StateValue::state(self.name.clone()),
            Child::Leaf(value) => StateValue::nested(self.name.clone(), StateValue::Value(value.clone())),
            Child::Node(child) => StateValue::nested(self.name.clone(), child.project()),
        }
    }

    /// Shape of the machine when this node is the root: the root's own name
    /// is left out unless it has no child.
    pub(crate) fn inner_value(&self) -> StateValue {
        match &self.child {
            Child::Empty => StateValue::state(self.name.clone()),
            Child::Leaf(value) => StateValue::Value(value.clone()),
            Child::Node(child) => child.project(),
        }
    }

    /// This node followed by every active descendant.
    pub(crate) fn active_path(&self) -> Vec<&Node> {
        let mut path = vec![self];
        let mut cursor = self;
        while let Child::Node(child) = &cursor.child {
            path.push(child);
            cursor = child;
        }
        path
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub(crate) fn accumulations(&self) -> &BTreeMap<String, Vec<Event>> {
        &self.accumulations
    }

    pub(crate) fn result(&self) -> Option<&Deferred> {
        self.result.as_ref()
    }
}

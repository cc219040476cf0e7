//! Chart arena and its builder.

use crate::builder::error::BuildError;
use crate::builder::scope::Scope;
use crate::core::{Completion, StateId};
use crate::validation::{validate_states, ChartValidation, DeclaredState};
use std::fmt;
use std::rc::Rc;
use stillwater::validation::Validation;

/// Body of a directive-emitting state descriptor.
pub type Descriptor = dyn Fn(&mut Scope<'_>) -> Completion;

fn describe<F>(descriptor: F) -> Rc<Descriptor>
where
    F: Fn(&mut Scope<'_>) -> Completion + 'static,
{
    Rc::new(descriptor)
}

#[derive(Clone)]
pub(crate) enum Body {
    Describe(Rc<Descriptor>),
    Delegate(StateId),
}

struct Declared {
    name: String,
    body: Option<Body>,
}

#[derive(Clone)]
pub(crate) struct StateEntry {
    pub(crate) name: String,
    pub(crate) body: Body,
}

/// Validated set of state descriptors.
///
/// Charts are immutable and cheap to clone. Any number of machines may be
/// started from one chart.
#[derive(Clone)]
pub struct Chart {
    states: Rc<[StateEntry]>,
}

impl Chart {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, id: StateId) -> bool {
        id.index() < self.states.len()
    }

    pub fn name(&self, id: StateId) -> Option<&str> {
        self.states.get(id.index()).map(|entry| entry.name.as_str())
    }

    /// First state declared under `name`. Names need not be unique.
    pub fn find(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|entry| entry.name == name)
            .map(|index| StateId(index as u32))
    }

    pub fn ids(&self) -> impl Iterator<Item = StateId> + '_ {
        (0..self.states.len()).map(|index| StateId(index as u32))
    }

    pub(crate) fn entry(&self, id: StateId) -> Option<&StateEntry> {
        self.states.get(id.index())
    }
}

impl fmt::Debug for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.states.iter().map(|entry| &entry.name))
            .finish()
    }
}

/// Builder for charts.
///
/// States are declared first so descriptors can refer to each other, then
/// defined. `build` validates the whole chart and reports every problem at
/// once.
///
/// # Example
///
/// ```rust
/// use hierarch::builder::ChartBuilder;
///
/// let mut chart = ChartBuilder::new();
/// let off = chart.declare("Off");
/// let on = chart.declare("On");
/// chart.define(off, move |s| {
///     s.on("flick", on);
/// });
/// chart.define(on, move |s| {
///     s.on("flick", off);
/// });
///
/// let chart = chart.build().unwrap();
/// assert_eq!(chart.name(on), Some("On"));
/// ```
#[derive(Default)]
pub struct ChartBuilder {
    states: Vec<Declared>,
    stray: Vec<StateId>,
}

impl ChartBuilder {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            stray: Vec::new(),
        }
    }

    /// Declare a state and get its handle. The state must be defined or
    /// delegated before the chart is built.
    pub fn declare(&mut self, name: impl Into<String>) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(Declared {
            name: name.into(),
            body: None,
        });
        id
    }

    /// Define a declared state by its descriptor. A later definition replaces
    /// an earlier one.
    pub fn define<F, C>(&mut self, id: StateId, descriptor: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> C + 'static,
        C: Into<Completion>,
    {
        let body = Body::Describe(describe(move |scope| descriptor(scope).into()));
        self.set_body(id, body)
    }

    /// Make `id` behave exactly like entering `target`: no directives of its
    /// own, completing with `target`.
    pub fn delegate(&mut self, id: StateId, target: StateId) -> &mut Self {
        self.set_body(id, Body::Delegate(target))
    }

    /// Declare and define a state in one step.
    pub fn state<F, C>(&mut self, name: impl Into<String>, descriptor: F) -> StateId
    where
        F: Fn(&mut Scope<'_>) -> C + 'static,
        C: Into<Completion>,
    {
        let id = self.declare(name);
        self.define(id, descriptor);
        id
    }

    /// Check the chart without consuming the builder.
    pub fn validate(&self) -> ChartValidation {
        let declared: Vec<DeclaredState<'_>> = self
            .states
            .iter()
            .map(|state| DeclaredState {
                name: &state.name,
                defined: state.body.is_some(),
                delegate: match state.body {
                    Some(Body::Delegate(target)) => Some(target),
                    _ => None,
                },
            })
            .collect();
        validate_states(&declared, &self.stray)
    }

    /// Build the chart.
    /// Returns every violation if the chart is not well formed.
    pub fn build(self) -> Result<Chart, BuildError> {
        if self.states.is_empty() {
            return Err(BuildError::EmptyChart);
        }

        if let Validation::Failure(violations) = self.validate() {
            return Err(BuildError::InvalidChart(violations.iter().cloned().collect()));
        }

        let states: Vec<StateEntry> = self
            .states
            .into_iter()
            .filter_map(|state| {
                state.body.map(|body| StateEntry {
                    name: state.name,
                    body,
                })
            })
            .collect();

        Ok(Chart {
            states: states.into(),
        })
    }

    fn set_body(&mut self, id: StateId, body: Body) -> &mut Self {
        match self.states.get_mut(id.index()) {
            Some(state) => state.body = Some(body),
            None => self.stray.push(id),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ChartViolation;

    #[test]
    fn build_requires_states() {
        assert!(matches!(ChartBuilder::new().build(), Err(BuildError::EmptyChart)));
    }

    #[test]
    fn build_reports_all_undefined_states() {
        let mut chart = ChartBuilder::new();
        chart.declare("A");
        chart.declare("B");

        let error = chart.build().unwrap_err();
        assert_eq!(
            error.violations(),
            &[
                ChartViolation::Undefined {
                    name: "A".to_string()
                },
                ChartViolation::Undefined {
                    name: "B".to_string()
                },
            ]
        );
    }

    #[test]
    fn definitions_for_foreign_handles_are_rejected() {
        let mut other = ChartBuilder::new();
        other.declare("x");
        let foreign = other.declare("y");

        let mut chart = ChartBuilder::new();
        chart.state("Only", |_| ());
        chart.define(foreign, |_| ());

        let error = chart.build().unwrap_err();
        assert_eq!(
            error.violations(),
            &[ChartViolation::StrayDefinition { id: foreign }]
        );
    }

    #[test]
    fn delegation_cycles_are_rejected() {
        let mut chart = ChartBuilder::new();
        let a = chart.declare("A");
        let b = chart.declare("B");
        chart.delegate(a, b).delegate(b, a);

        assert!(chart.validate().is_failure());
    }

    #[test]
    fn chart_lookups() {
        let mut chart = ChartBuilder::new();
        let first = chart.state("Dup", |_| ());
        let second = chart.state("Dup", |_| ());
        let chart = chart.build().unwrap();

        assert_eq!(chart.len(), 2);
        assert_eq!(chart.find("Dup"), Some(first));
        assert_ne!(first, second);
        assert!(chart.contains(second));
        assert!(!chart.contains(StateId(5)));
        assert_eq!(chart.ids().count(), 2);
    }
}

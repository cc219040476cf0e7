//! The scope a descriptor emits its directives into.

use crate::builder;
use crate::core::{Context, Directive, Event, Guard, StateId, Target};
use crate::effects::{CancellationToken, EffectOutput, EventSource};
use serde_json::Value;

/// Collector handed to a state descriptor while it is evaluated.
///
/// Each method records one directive, in call order. Descriptors run again
/// every time their state is entered, so the scope is always fresh.
///
/// # Example
///
/// ```rust
/// use hierarch::builder::ChartBuilder;
///
/// let mut chart = ChartBuilder::new();
/// let idle = chart.declare("idle");
/// let loading = chart.declare("loading");
/// chart.define(idle, move |s| {
///     s.on("FETCH", loading).expose("waiting");
/// });
/// chart.define(loading, move |s| {
///     s.entry("fetch", |_token| serde_json::json!({"rows": 3}))
///         .on("CANCEL", idle);
/// });
/// assert!(chart.build().is_ok());
/// ```
pub struct Scope<'a> {
    state: &'a str,
    context: Context<'a>,
    directives: Vec<Directive>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(state: &'a str, context: Context<'a>) -> Self {
        Self {
            state,
            context,
            directives: Vec::new(),
        }
    }

    pub(crate) fn into_directives(self) -> Vec<Directive> {
        self.directives
    }

    /// Name of the state being entered.
    pub fn state(&self) -> &str {
        self.state
    }

    pub fn context(&self) -> &Context<'a> {
        &self.context
    }

    /// The event whose dispatch caused this entry, if any.
    pub fn event(&self) -> Option<&'a Event> {
        self.context.event()
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn emit(&mut self, directive: Directive) -> &mut Self {
        self.directives.push(directive);
        self
    }

    /// Emit a reusable group of directives.
    pub fn extend<I>(&mut self, directives: I) -> &mut Self
    where
        I: IntoIterator<Item = Directive>,
    {
        self.directives.extend(directives);
        self
    }

    pub fn on(&mut self, event: impl Into<String>, target: impl Into<Target>) -> &mut Self {
        self.emit(builder::on(event, target))
    }

    pub fn entry<F, O>(&mut self, name: impl Into<String>, effect: F) -> &mut Self
    where
        F: Fn(&CancellationToken) -> O + 'static,
        O: Into<EffectOutput>,
    {
        self.emit(builder::entry(name, effect))
    }

    pub fn send(
        &mut self,
        receiver: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> &mut Self {
        self.emit(builder::send(receiver, method, args))
    }

    pub fn exit<F>(&mut self, name: impl Into<String>, effect: F) -> &mut Self
    where
        F: Fn() + 'static,
    {
        self.emit(builder::exit(name, effect))
    }

    pub fn subscribe<S, I, N>(&mut self, source: S, events: I) -> &mut Self
    where
        S: EventSource + 'static,
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.emit(builder::subscribe(source, events))
    }

    pub fn accumulate(&mut self, event: impl Into<String>, buffer: impl Into<String>) -> &mut Self {
        self.emit(builder::accumulate(event, buffer))
    }

    /// Read a named context value, recording the read.
    pub fn read_context(&mut self, name: &str) -> Option<Value> {
        self.emit(builder::read_context(name));
        self.context.read(name)
    }

    pub fn expose(&mut self, tag: impl Into<String>) -> &mut Self {
        self.emit(builder::expose(tag))
    }

    pub fn always(&mut self, target: impl Into<Target>) -> &mut Self {
        self.emit(builder::always(target))
    }

    pub fn cond(&mut self, guard: impl Into<Guard>, target: StateId) -> &mut Self {
        self.emit(builder::cond(guard, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directives_are_recorded_in_order() {
        let mut scope = Scope::new("Form", Context::empty());
        scope
            .on("BLUR", StateId(1))
            .accumulate("message", "inbox")
            .expose("editing")
            .cond(true, StateId(2));

        let kinds: Vec<&str> = scope
            .directives()
            .iter()
            .map(|d| match d {
                Directive::On { .. } => "on",
                Directive::Accumulate { .. } => "accumulate",
                Directive::Expose(_) => "expose",
                Directive::Cond(_) => "cond",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["on", "accumulate", "expose", "cond"]);
        assert_eq!(scope.state(), "Form");
    }

    #[test]
    fn read_context_records_and_returns_value() {
        let reader = |name: &str| (name == "user").then(|| json!("ada"));
        let mut scope = Scope::new("Profile", Context::new(None, Some(&reader)));

        assert_eq!(scope.read_context("user"), Some(json!("ada")));
        assert_eq!(scope.read_context("missing"), None);
        let directives = scope.into_directives();
        assert_eq!(directives.len(), 2);
        assert!(matches!(&directives[0], Directive::ReadContext(name) if name == "user"));
    }

    #[test]
    fn event_is_visible_during_evaluation() {
        let event = Event::new("FETCH");
        let scope = Scope::new("loading", Context::new(Some(&event), None));
        assert_eq!(scope.event().map(|e| e.name.as_str()), Some("FETCH"));
    }
}

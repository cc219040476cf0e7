//! Per-node handler registry.
//!
//! The registry is rebuilt every time its node is entered. It records the
//! handlers declared by the node's directives, runs entry effects as they
//! arrive, and owns the node's cancellation token.

use crate::core::{Directive, EntryEffect, ExitEffect, Target};
use crate::effects::{Aggregator, CancellationToken, EventSink, EventSource, MessageTarget};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// Receivers created by entry effects, visible to `Send` effects of the same
/// node and of its descendants.
#[derive(Default)]
pub(crate) struct ReceiverScope {
    own: RefCell<HashMap<String, Rc<dyn MessageTarget>>>,
    parent: Option<Rc<ReceiverScope>>,
}

impl ReceiverScope {
    pub(crate) fn new(parent: Option<Rc<ReceiverScope>>) -> Rc<Self> {
        Rc::new(Self {
            own: RefCell::new(HashMap::new()),
            parent,
        })
    }

    fn insert(&self, name: String, receiver: Rc<dyn MessageTarget>) {
        self.own.borrow_mut().insert(name, receiver);
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Rc<dyn MessageTarget>> {
        if let Some(receiver) = self.own.borrow().get(name) {
            return Some(receiver.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    fn clear(&self) {
        self.own.borrow_mut().clear();
    }
}

pub(crate) struct Subscription {
    source: Rc<dyn EventSource>,
    events: Vec<String>,
}

pub(crate) struct HandlerRegistry {
    events: HashMap<String, Target>,
    always: Vec<Target>,
    entry_names: Vec<String>,
    exits: Vec<ExitEffect>,
    subscriptions: Vec<Subscription>,
    accumulations: Vec<(String, String)>,
    tags: BTreeSet<String>,
    receivers: Rc<ReceiverScope>,
    batch: Aggregator,
    token: CancellationToken,
}

impl HandlerRegistry {
    pub(crate) fn new(parent_receivers: Option<Rc<ReceiverScope>>) -> Self {
        Self {
            events: HashMap::new(),
            always: Vec::new(),
            entry_names: Vec::new(),
            exits: Vec::new(),
            subscriptions: Vec::new(),
            accumulations: Vec::new(),
            tags: BTreeSet::new(),
            receivers: ReceiverScope::new(parent_receivers),
            batch: Aggregator::new(),
            token: CancellationToken::new(),
        }
    }

    /// Register one directive. Entry effects run here, synchronously.
    pub(crate) fn add(&mut self, directive: Directive, state: &str) {
        match directive {
            Directive::On { event, target } => {
                self.events.insert(event, target);
            }
            Directive::Entry(EntryEffect::Run { name, effect }) => {
                tracing::trace!(state, effect = %name, "running entry effect");
                let output = effect(&self.token);
                if let Some(receiver) = output.receiver {
                    self.receivers.insert(name.clone(), receiver);
                }
                self.entry_names.push(name.clone());
                self.batch.push(name, output.result);
            }
            Directive::Entry(EntryEffect::Send { receiver, message }) => {
                match self.receivers.lookup(&receiver) {
                    Some(target) => target.deliver(&message),
                    None => tracing::warn!(
                        state,
                        receiver = %receiver,
                        method = %message.method,
                        "no receiver registered under this name; message dropped"
                    ),
                }
            }
            Directive::Exit(effect) => self.exits.push(effect),
            Directive::Subscribe { source, events } => {
                self.subscriptions.push(Subscription { source, events })
            }
            Directive::Accumulate { event, buffer } => self.accumulations.push((event, buffer)),
            Directive::ReadContext(name) => {
                tracing::trace!(state, name = %name, "descriptor read context");
            }
            Directive::Expose(tag) => {
                self.tags.insert(tag);
            }
            Directive::Always(target) => self.always.push(target),
            Directive::Cond(cond) => self.always.push(Target::Cond(cond)),
        }
    }

    /// Start every declared subscription, bound to this registry's token.
    pub(crate) fn subscribe_all(&self, sink: &EventSink) {
        for subscription in &self.subscriptions {
            subscription
                .source
                .subscribe(&subscription.events, sink.clone(), &self.token);
        }
    }

    pub(crate) fn target_for(&self, event: &str) -> Option<&Target> {
        self.events.get(event)
    }

    pub(crate) fn always(&self) -> &[Target] {
        &self.always
    }

    pub(crate) fn entry_names(&self) -> &[String] {
        &self.entry_names
    }

    pub(crate) fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub(crate) fn buffers_for<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.accumulations
            .iter()
            .filter(move |(name, _)| name == event)
            .map(|(_, buffer)| buffer.as_str())
    }

    /// True when nothing registered here can move the machine any further.
    pub(crate) fn is_final(&self) -> bool {
        self.events.is_empty() && self.always.is_empty() && self.subscriptions.is_empty()
    }

    pub(crate) fn take_batch(&mut self) -> Aggregator {
        std::mem::take(&mut self.batch)
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn receivers(&self) -> &Rc<ReceiverScope> {
        &self.receivers
    }

    pub(crate) fn run_exit(&self) {
        for effect in &self.exits {
            tracing::trace!(effect = %effect.name, "running exit effect");
            effect.run();
        }
    }

    /// Clear every handler and fire the token, replacing it with a fresh one.
    pub(crate) fn reset(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.events.clear();
        self.always.clear();
        self.entry_names.clear();
        self.exits.clear();
        self.subscriptions.clear();
        self.accumulations.clear();
        self.tags.clear();
        self.receivers.clear();
        self.batch = Aggregator::new();
    }
}

impl Drop for HandlerRegistry {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;
    use crate::core::StateId;
    use crate::effects::{EventBus, Message};
    use serde_json::json;
    use std::cell::Cell;

    struct Dialog(RefCell<Vec<String>>);

    impl MessageTarget for Dialog {
        fn deliver(&self, message: &Message) {
            self.0.borrow_mut().push(message.method.clone());
        }
    }

    #[test]
    fn later_handler_overwrites_earlier() {
        let mut registry = HandlerRegistry::new(None);
        registry.add(builder::on("go", StateId(1)), "s");
        registry.add(builder::on("go", StateId(2)), "s");

        assert!(matches!(registry.target_for("go"), Some(Target::State(StateId(2)))));
        assert!(registry.target_for("stop").is_none());
    }

    #[test]
    fn entry_effects_run_when_added() {
        let runs = Rc::new(Cell::new(0));
        let seen = runs.clone();
        let mut registry = HandlerRegistry::new(None);
        registry.add(
            builder::entry("load", move |_| {
                seen.set(seen.get() + 1);
                json!(7)
            }),
            "s",
        );

        assert_eq!(runs.get(), 1);
        assert_eq!(registry.entry_names(), &["load".to_string()]);
        let combined = registry.take_batch().combine().unwrap();
        assert_eq!(combined.outcome(), Some(Ok(json!({"load": 7}))));
    }

    #[test]
    fn send_reaches_receiver_on_ancestor() {
        let dialog = Rc::new(Dialog(RefCell::new(Vec::new())));
        let mut parent = HandlerRegistry::new(None);
        let created = dialog.clone();
        parent.add(
            builder::entry("dialog", move |_| {
                crate::effects::EffectOutput::from(()).with_receiver(created.clone())
            }),
            "parent",
        );

        let mut child = HandlerRegistry::new(Some(parent.receivers().clone()));
        child.add(builder::send("dialog", "showModal", vec![]), "child");
        child.add(builder::send("missing", "close", vec![]), "child");

        assert_eq!(*dialog.0.borrow(), vec!["showModal".to_string()]);
        assert!(child.entry_names().is_empty());
    }

    #[test]
    fn reset_clears_and_fires_token() {
        let bus = EventBus::new();
        let mut registry = HandlerRegistry::new(None);
        registry.add(builder::on("go", StateId(1)), "s");
        registry.add(builder::subscribe(bus.clone(), ["key"]), "s");
        registry.add(builder::accumulate("key", "keys"), "s");
        registry.add(builder::expose("busy"), "s");
        registry.subscribe_all(&EventSink::new(|_| {}));
        let token = registry.token().clone();
        assert_eq!(bus.listener_count(), 1);
        assert!(!registry.is_final());

        registry.reset();
        assert!(token.is_cancelled());
        assert!(!registry.token().is_cancelled());
        assert_eq!(bus.listener_count(), 0);
        assert!(registry.target_for("go").is_none());
        assert!(registry.tags().is_empty());
        assert_eq!(registry.buffers_for("key").count(), 0);
        assert!(registry.is_final());
    }

    #[test]
    fn exit_effects_run_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HandlerRegistry::new(None);
        for name in ["first", "second"] {
            let log = log.clone();
            registry.add(builder::exit(name, move || log.borrow_mut().push(name)), "s");
        }

        registry.run_exit();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn cond_directive_joins_always_list() {
        let mut registry = HandlerRegistry::new(None);
        registry.add(builder::always(StateId(1)), "s");
        registry.add(builder::cond(true, StateId(2)), "s");
        assert_eq!(registry.always().len(), 2);
        assert!(matches!(registry.always()[1], Target::Cond(_)));
    }

    #[test]
    fn dropping_registry_fires_token() {
        let registry = HandlerRegistry::new(None);
        let token = registry.token().clone();
        drop(registry);
        assert!(token.is_cancelled());
    }
}

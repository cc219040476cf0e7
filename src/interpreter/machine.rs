//! The running machine and its dispatch loop.

use crate::builder::Chart;
use crate::core::{Event, StateId, StateValue, TransitionHistory, TransitionRecord};
use crate::effects::{CancellationToken, Deferred, EffectError, EventSink, Settler};
use crate::interpreter::error::InterpreterError;
use crate::interpreter::node::{Node, Resolution};
use crate::interpreter::notify::{ListenerId, Notification};
use crate::interpreter::options::StartOptions;
use crate::interpreter::runtime::Runtime;
use crate::interpreter::snapshot::{Snapshot, SnapshotCache};
use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Work waiting for the dispatch loop.
enum Pending {
    Event(Event),
    /// An effect batch settled. Applied only if `token` is live and the
    /// counter still reads `change`.
    Settled {
        event: Event,
        change: u64,
        token: CancellationToken,
    },
    Abort,
}

struct Core {
    this: Weak<Core>,
    rt: Runtime,
    root: RefCell<Option<Node>>,
    root_name: String,
    busy: Cell<bool>,
    aborted: Cell<bool>,
    queue: RefCell<VecDeque<Pending>>,
    cache: SnapshotCache,
    history: RefCell<TransitionHistory>,
}

/// Start a machine rooted at `root`.
///
/// The root is entered, its child tree is built and every entry effect on
/// the initial path runs before this returns. The change counter then reads
/// zero.
///
/// # Example
///
/// ```rust
/// use hierarch::builder::ChartBuilder;
/// use hierarch::interpreter::{start, StartOptions};
/// use hierarch::states;
///
/// let mut builder = ChartBuilder::new();
/// states!(builder => switch, off = "Off", on = "On");
/// builder.define(off, move |s| {
///     s.on("flick", on);
/// });
/// builder.define(on, move |s| {
///     s.on("flick", off);
/// });
/// builder.define(switch, move |_| off);
/// let chart = builder.build().unwrap();
///
/// let machine = start(&chart, switch, StartOptions::default()).unwrap();
/// assert_eq!(machine.value().to_string(), "Off");
///
/// let snapshot = machine.next("flick").unwrap();
/// assert_eq!(snapshot.state.to_string(), "On");
/// assert_eq!(snapshot.change, 1);
/// ```
pub fn start(chart: &Chart, root: StateId, options: StartOptions) -> Result<Machine, InterpreterError> {
    let root_name = chart
        .name(root)
        .ok_or(InterpreterError::UnknownState(root))?
        .to_string();
    let cancellation = options.cancellation.clone();
    let machine = Uuid::new_v4();

    let core = Rc::new_cyclic(|this: &Weak<Core>| {
        let sink = {
            let this = this.clone();
            EventSink::new(move |event| {
                if let Some(core) = this.upgrade() {
                    core.deliver_detached(Pending::Event(event));
                }
            })
        };
        Core {
            this: this.clone(),
            rt: Runtime::new(chart.clone(), options, machine, sink),
            root: RefCell::new(None),
            root_name,
            busy: Cell::new(false),
            aborted: Cell::new(false),
            queue: RefCell::new(VecDeque::new()),
            cache: SnapshotCache::default(),
            history: RefCell::new(TransitionHistory::new()),
        }
    });

    core.boot(root)?;
    tracing::info!(machine = %machine, root = %core.root_name, "machine started");

    if let Some(token) = cancellation {
        let this = Rc::downgrade(&core);
        token.on_cancel(move || {
            if let Some(core) = this.upgrade() {
                core.request_abort();
            }
        });
    }

    Ok(Machine { core })
}

impl Core {
    fn boot(&self, root: StateId) -> Result<(), InterpreterError> {
        self.busy.set(true);
        let built = self.build_root(root);
        self.rt.reset_counter();
        match built {
            Ok(node) => *self.root.borrow_mut() = Some(node),
            Err(error) => {
                self.queue.borrow_mut().clear();
                self.busy.set(false);
                return Err(error);
            }
        }
        self.rt.flush();
        self.arm_watches();
        self.drain()
    }

    fn build_root(&self, root: StateId) -> Result<Node, InterpreterError> {
        let mut node = Node::enter(&self.rt, root, 0, None, None)?;
        if let Resolution::Replace(target) = node.activate(&self.rt)? {
            node.transition_to(&self.rt, target)?;
        }
        Ok(node)
    }

    fn deliver(&self, pending: Pending) -> Result<(), InterpreterError> {
        self.queue.borrow_mut().push_back(pending);
        if self.busy.get() {
            return Ok(());
        }
        self.drain()
    }

    fn deliver_detached(&self, pending: Pending) {
        if let Err(error) = self.deliver(pending) {
            tracing::error!(machine = %self.rt.machine, %error, "dispatch failed");
        }
    }

    fn request_abort(&self) {
        self.deliver_detached(Pending::Abort);
    }

    /// Process queued work in arrival order until the queue is empty.
    fn drain(&self) -> Result<(), InterpreterError> {
        self.busy.set(true);
        let result = self.drain_queue();
        if result.is_err() {
            self.queue.borrow_mut().clear();
        }
        self.busy.set(false);
        result
    }

    fn drain_queue(&self) -> Result<(), InterpreterError> {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(pending) = next else {
                return Ok(());
            };
            self.process(pending)?;
        }
    }

    fn process(&self, pending: Pending) -> Result<(), InterpreterError> {
        match pending {
            Pending::Event(event) => self.step(event),
            Pending::Settled {
                event,
                change,
                token,
            } => {
                if token.is_cancelled() || change != self.rt.change() {
                    tracing::debug!(
                        machine = %self.rt.machine,
                        event = %event.name,
                        armed = change,
                        change = self.rt.change(),
                        "discarding stale effect result"
                    );
                    return Ok(());
                }
                self.step(event)
            }
            Pending::Abort => {
                self.abort_now();
                Ok(())
            }
        }
    }

    /// Dispatch one event through the tree.
    fn step(&self, event: Event) -> Result<(), InterpreterError> {
        if self.aborted.get() {
            tracing::trace!(machine = %self.rt.machine, event = %event.name, "machine aborted; event dropped");
            return Ok(());
        }
        let mut root = self.root.borrow_mut();
        let Some(node) = root.as_mut() else {
            return Ok(());
        };

        let span = tracing::debug_span!("dispatch", machine = %self.rt.machine, event = %event.name);
        let _entered = span.enter();

        let before = self.rt.change();
        let from = node.inner_value();

        self.rt.set_active_event(Some(event.clone()));
        let outcome = match node.receive(&self.rt, &event) {
            Ok(Resolution::Replace(target)) => node.transition_to(&self.rt, target),
            Ok(_) => Ok(()),
            Err(error) => Err(error),
        };
        self.rt.set_active_event(None);

        let change = self.rt.change();
        if outcome.is_ok() {
            if change == before {
                tracing::trace!("event not handled");
            } else {
                let record = TransitionRecord {
                    from,
                    to: node.inner_value(),
                    event: event.name.clone(),
                    change,
                    timestamp: Utc::now(),
                };
                tracing::debug!(to = %record.to, change, "state changed");
                self.remember(record);
            }
        }
        drop(root);

        self.rt.flush();
        outcome?;
        self.arm_watches();
        Ok(())
    }

    fn remember(&self, record: TransitionRecord) {
        let history = self.history.borrow().record(record);
        let history = match self.rt.options.history_limit {
            Some(limit) => history.retain_last(limit),
            None => history,
        };
        *self.history.borrow_mut() = history;
    }

    /// Route every effect batch created during the step back into the
    /// machine once it settles.
    fn arm_watches(&self) {
        let change = self.rt.change();
        for watch in self.rt.take_watches() {
            let this = self.this.clone();
            let success = self.rt.options.success_event.clone();
            let failure = self.rt.options.failure_event.clone();
            let token = watch.token;
            let state = watch.state;
            watch.result.on_settle(move |outcome| {
                let Some(core) = this.upgrade() else {
                    return;
                };
                let event = match outcome {
                    Ok(value) => Event::with_payload(success, value.clone()),
                    Err(error) => {
                        Event::with_payload(failure, serde_json::to_value(error).unwrap_or_default())
                    }
                };
                tracing::trace!(state = %state, event = %event.name, "effect batch settled");
                core.deliver_detached(Pending::Settled {
                    event,
                    change,
                    token,
                });
            });
        }
    }

    fn abort_now(&self) {
        if self.aborted.replace(true) {
            return;
        }
        let root = self.root.borrow_mut().take();
        if let Some(mut root) = root {
            root.teardown(&self.rt);
        }
        self.queue.borrow_mut().clear();
        tracing::info!(machine = %self.rt.machine, "machine aborted");
        self.rt.publish(&Notification::Aborted);
    }

    fn snapshot(&self) -> Rc<Snapshot> {
        let change = self.rt.change();
        if let Some(snapshot) = self.cache.fresh(change) {
            return snapshot;
        }
        if let Ok(root) = self.root.try_borrow() {
            if let Some(node) = root.as_ref() {
                return self.cache.store(Snapshot::capture(node, change));
            }
        }
        self.cache
            .last()
            .unwrap_or_else(|| Rc::new(Snapshot::bare(&self.root_name, change)))
    }
}

/// Handle to a running machine.
///
/// All methods take `&self`. Events delivered from listeners, effects or
/// event sources while a dispatch is running are queued and processed, in
/// order, before the outer call returns.
pub struct Machine {
    core: Rc<Core>,
}

impl Machine {
    /// Random id attached to this machine's log events.
    pub fn id(&self) -> Uuid {
        self.core.rt.machine
    }

    /// The cached snapshot for the current change counter.
    ///
    /// Listeners are called after the tree settles, so a snapshot taken from
    /// a notification already reflects the change it reports.
    pub fn snapshot(&self) -> Rc<Snapshot> {
        self.core.snapshot()
    }

    pub fn value(&self) -> StateValue {
        self.snapshot().state.clone()
    }

    /// Name of the deepest active state.
    pub fn current(&self) -> Option<String> {
        let root = self.core.root.try_borrow().ok()?;
        let node = root.as_ref()?;
        let deepest = node.active_path().last().map(|node| node.name().to_string());
        deepest
    }

    pub fn change_count(&self) -> u64 {
        self.core.rt.change()
    }

    /// Dispatch `event` and return the resulting snapshot.
    ///
    /// Returns [`InterpreterError::Reentrant`] when called while the machine
    /// is already dispatching. Use [`Machine::sink`] to feed events from
    /// callbacks instead.
    pub fn next(&self, event: impl Into<Event>) -> Result<Rc<Snapshot>, InterpreterError> {
        if self.core.busy.get() {
            return Err(InterpreterError::Reentrant);
        }
        if self.core.aborted.get() {
            return Err(InterpreterError::Aborted);
        }
        self.core.deliver(Pending::Event(event.into()))?;
        Ok(self.snapshot())
    }

    /// Sink feeding this machine. Safe to call at any time, including from
    /// inside a dispatch. Events sent after the machine is dropped are lost.
    pub fn sink(&self) -> EventSink {
        self.core.rt.sink()
    }

    /// Accumulation buffers of the active path, merged by buffer name.
    /// Deeper states win on conflicting names.
    pub fn accumulations(&self) -> BTreeMap<String, Vec<Event>> {
        let Ok(root) = self.core.root.try_borrow() else {
            return BTreeMap::new();
        };
        let Some(node) = root.as_ref() else {
            return BTreeMap::new();
        };
        let merged = node
            .active_path()
            .into_iter()
            .flat_map(|node| node.accumulations().clone())
            .collect();
        merged
    }

    /// Combined effect results of the active path.
    pub fn results(&self) -> Option<Deferred> {
        self.snapshot().results.clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.snapshot().tags.iter().cloned().collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.snapshot().has_tag(tag)
    }

    /// True when no active state declares a way to move on.
    pub fn done(&self) -> bool {
        if self.core.aborted.get() {
            return true;
        }
        let Ok(root) = self.core.root.try_borrow() else {
            return false;
        };
        root.as_ref().map_or(true, |node| {
            node.active_path()
                .iter()
                .all(|node| node.registry().is_final())
        })
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Notification) + 'static,
    {
        self.core.rt.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.core.rt.notifier.unsubscribe(id)
    }

    pub fn history(&self) -> TransitionHistory {
        self.core.history.borrow().clone()
    }

    /// Resolves the first time a state whose shape equals `expected` is
    /// entered. Resolves immediately if the machine is already there.
    ///
    /// Rejects when `token` fires first or the machine aborts.
    pub fn when_state(
        &self,
        expected: impl Into<StateValue>,
        token: Option<&CancellationToken>,
    ) -> Deferred {
        let expected = expected.into();
        let reached = serde_json::to_value(&expected).unwrap_or_default();
        if self.value() == expected {
            return Deferred::resolved(reached);
        }
        if self.core.aborted.get() {
            return Deferred::rejected("machine aborted");
        }

        let (deferred, settler) = Deferred::pending();
        let settler: Rc<RefCell<Option<Settler>>> = Rc::new(RefCell::new(Some(settler)));
        let id_slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let finish = {
            let settler = settler.clone();
            let id_slot = id_slot.clone();
            let core = Rc::downgrade(&self.core);
            move |outcome: Result<(), EffectError>| {
                let Some(settler) = settler.borrow_mut().take() else {
                    return;
                };
                if let (Some(core), Some(id)) = (core.upgrade(), id_slot.get()) {
                    core.rt.notifier.unsubscribe(id);
                }
                match outcome {
                    Ok(()) => settler.resolve(reached.clone()),
                    Err(error) => settler.reject(error),
                }
            }
        };
        let finish = Rc::new(finish);

        let on_notify = finish.clone();
        let id = self.subscribe(move |notification| match notification {
            Notification::StateChanged { state, .. } if *state == expected => on_notify(Ok(())),
            Notification::Aborted => on_notify(Err(EffectError::new("machine aborted"))),
            _ => {}
        });
        id_slot.set(Some(id));

        if let Some(token) = token {
            let on_cancel = finish.clone();
            token.on_cancel(move || on_cancel(Err(EffectError::new("cancelled"))));
        }
        deferred
    }

    /// Tear the whole tree down. Exit effects run deepest first, then every
    /// token fires. Later calls to [`Machine::next`] return
    /// [`InterpreterError::Aborted`].
    pub fn abort(&self) {
        self.core.request_abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.core.aborted.get()
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id())
            .field("root", &self.core.root_name)
            .field("change", &self.change_count())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ChartBuilder;
    use crate::effects::EventBus;

    fn switch() -> (Chart, StateId) {
        let mut builder = ChartBuilder::new();
        let switch = builder.declare("Switch");
        let off = builder.declare("Off");
        let on = builder.declare("On");
        builder.define(off, move |s| {
            s.on("flick", on);
        });
        builder.define(on, move |s| {
            s.on("flick", off);
        });
        builder.define(switch, move |_| off);
        (builder.build().unwrap(), switch)
    }

    #[test]
    fn start_resets_counter() {
        let (chart, root) = switch();
        let machine = start(&chart, root, StartOptions::default()).unwrap();
        assert_eq!(machine.change_count(), 0);
        assert_eq!(machine.value(), StateValue::state("Off"));
        assert_eq!(machine.current().as_deref(), Some("Off"));
    }

    #[test]
    fn snapshot_is_cached_per_change() {
        let (chart, root) = switch();
        let machine = start(&chart, root, StartOptions::default()).unwrap();
        let first = machine.snapshot();
        assert!(Rc::ptr_eq(&first, &machine.snapshot()));

        let after = machine.next("flick").unwrap();
        assert!(!Rc::ptr_eq(&first, &after));
        assert!(Rc::ptr_eq(&after, &machine.snapshot()));

        let unchanged = machine.next("unknown").unwrap();
        assert!(Rc::ptr_eq(&after, &unchanged));
    }

    #[test]
    fn unknown_root_is_rejected() {
        let (chart, _) = switch();
        let error = start(&chart, StateId(42), StartOptions::default()).unwrap_err();
        assert_eq!(error, InterpreterError::UnknownState(StateId(42)));
    }

    #[test]
    fn next_inside_listener_is_reentrant() {
        let (chart, root) = switch();
        let machine = Rc::new(start(&chart, root, StartOptions::default()).unwrap());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let handle = Rc::downgrade(&machine);
        let errors = seen.clone();
        machine.subscribe(move |_| {
            if let Some(machine) = handle.upgrade() {
                if let Err(error) = machine.next("flick") {
                    errors.borrow_mut().push(error);
                }
            }
        });

        machine.next("flick").unwrap();
        assert_eq!(*seen.borrow(), vec![InterpreterError::Reentrant]);
        assert_eq!(machine.value(), StateValue::state("On"));
    }

    #[test]
    fn sink_inside_listener_is_queued() {
        let (chart, root) = switch();
        let machine = start(&chart, root, StartOptions::default()).unwrap();
        let sink = machine.sink();
        let sent = Rc::new(Cell::new(false));
        let once = sent.clone();
        machine.subscribe(move |_| {
            if !once.replace(true) {
                sink.send("flick");
            }
        });

        let snapshot = machine.next("flick").unwrap();
        assert_eq!(snapshot.state, StateValue::state("Off"));
        assert_eq!(snapshot.change, 2);
        assert_eq!(machine.history().len(), 2);
    }

    #[test]
    fn abort_tears_down_and_blocks_dispatch() {
        let bus = EventBus::new();
        let source = bus.clone();
        let mut builder = ChartBuilder::new();
        let idle = builder.state("idle", move |s| {
            s.subscribe(source.clone(), ["ping"]);
        });
        let chart = builder.build().unwrap();

        let machine = start(&chart, idle, StartOptions::default()).unwrap();
        assert_eq!(bus.listener_count(), 1);

        let aborted = Rc::new(Cell::new(false));
        let flag = aborted.clone();
        machine.subscribe(move |n| flag.set(flag.get() || *n == Notification::Aborted));

        machine.abort();
        assert!(machine.is_aborted());
        assert!(aborted.get());
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(machine.next("ping").unwrap_err(), InterpreterError::Aborted);
        assert!(machine.done());
    }
}

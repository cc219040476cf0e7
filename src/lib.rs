//! Hierarch: a hierarchical statechart interpreter
//!
//! Hierarch keeps a pure core and an imperative shell apart. States are
//! described by closures that emit *directives* (handlers, effects,
//! subscriptions) and complete with a child. The interpreter turns those
//! descriptions into a live tree of nested states, dispatches events into
//! it and publishes change-counted snapshots.
//!
//! # Core Concepts
//!
//! - **Chart**: the set of named state descriptors, built with [`ChartBuilder`]
//! - **Directives**: what a descriptor asks for: `on`, `entry`, `exit`,
//!   `subscribe`, `accumulate`, `expose` and friends
//! - **Targets**: plain states, guarded conditions, choices, compound jumps
//!   and in-place mappers
//! - **Machine**: a running chart. Events go in, snapshots come out
//! - **Effects**: entry effects return deferred results that are merged and
//!   fed back as `SUCCESS`/`FAILURE` events
//!
//! # Example
//!
//! ```rust
//! use hierarch::{start, states, ChartBuilder, StartOptions, StateValue};
//!
//! let mut chart = ChartBuilder::new();
//! states!(chart => light, green, yellow, red, walk, wait);
//!
//! chart.define(green, move |s| {
//!     s.on("TIMER", yellow);
//! });
//! chart.define(yellow, move |s| {
//!     s.on("TIMER", red);
//! });
//! chart.define(walk, move |s| {
//!     s.on("PED_TIMER", wait);
//! });
//! chart.define(wait, |_| ());
//! chart.define(red, move |s| {
//!     s.on("TIMER", green);
//!     walk
//! });
//! chart.define(light, move |_| green);
//! let chart = chart.build().unwrap();
//!
//! let machine = start(&chart, light, StartOptions::default()).unwrap();
//! machine.next("TIMER").unwrap();
//! machine.next("TIMER").unwrap();
//! assert_eq!(machine.value(), StateValue::nested("red", StateValue::state("walk")));
//!
//! machine.next("PED_TIMER").unwrap();
//! assert_eq!(machine.value().to_string(), "red.wait");
//! ```

pub mod builder;
pub mod core;
pub mod effects;
pub mod interpreter;
pub mod validation;

// Re-export commonly used types
pub use builder::{BuildError, Chart, ChartBuilder, Scope};
pub use core::{ChoiceMap, Event, Guard, Primitive, StateId, StateValue, TransitionHistory};
pub use effects::{CancellationToken, Deferred, EffectError, EventBus, EventSink};
pub use interpreter::{start, InterpreterError, Machine, Notification, Snapshot, StartOptions};

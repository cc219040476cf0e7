//! Merging the results of a node's entry effects.
//!
//! Every named entry effect contributes one [`Deferred`] to its node's batch.
//! The batch resolves with a JSON object `{effect_name: value}` once every
//! member resolves, or rejects with the first failure. A batch may be chained
//! after the previous batch of the same child slot. It then becomes
//! observable only after that earlier batch has settled, whatever its outcome.

use super::deferred::{Deferred, Settler};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Batch of named effect results for one node entry.
#[derive(Debug, Default)]
pub struct Aggregator {
    entries: Vec<(String, Deferred)>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, result: Deferred) {
        self.entries.push((name.into(), result));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Combined result of the batch, or `None` for an empty batch.
    pub fn combine(self) -> Option<Deferred> {
        if self.entries.is_empty() {
            None
        } else {
            Some(all(self.entries))
        }
    }

    /// Combined result that settles no earlier than `previous`.
    pub fn chain_after(self, previous: Option<&Deferred>) -> Option<Deferred> {
        let Some(previous) = previous else {
            return self.combine();
        };
        if self.entries.is_empty() {
            return None;
        }
        let entries = self.entries;
        let (chained, settler) = Deferred::pending();
        previous.on_settle(move |_| {
            all(entries).on_settle(move |outcome| settler.settle(outcome.clone()));
        });
        Some(chained)
    }
}

/// Resolve with `{name: value}` for every entry, or reject with the first
/// failure.
///
/// # Example
///
/// ```rust
/// use hierarch::effects::{all, Deferred};
/// use serde_json::json;
///
/// let (slow, settler) = Deferred::pending();
/// let combined = all(vec![
///     ("fast".to_string(), Deferred::resolved(1)),
///     ("slow".to_string(), slow),
/// ]);
/// assert!(!combined.is_settled());
///
/// settler.resolve("done");
/// assert_eq!(combined.outcome(), Some(Ok(json!({"fast": 1, "slow": "done"}))));
/// ```
pub fn all(entries: Vec<(String, Deferred)>) -> Deferred {
    gather(
        entries
            .into_iter()
            .map(|(name, result)| (Some(name), result))
            .collect(),
    )
}

/// Resolve with the union of several object results. Later parts overwrite
/// keys of earlier parts.
pub fn merge(parts: Vec<Deferred>) -> Deferred {
    gather(parts.into_iter().map(|part| (None, part)).collect())
}

struct Gathering {
    remaining: usize,
    values: Vec<Option<Value>>,
    settler: Option<Settler>,
}

fn gather(parts: Vec<(Option<String>, Deferred)>) -> Deferred {
    let (combined, settler) = Deferred::pending();
    if parts.is_empty() {
        settler.resolve(Value::Object(Map::new()));
        return combined;
    }

    let names: Rc<Vec<Option<String>>> = Rc::new(parts.iter().map(|(name, _)| name.clone()).collect());
    let state = Rc::new(RefCell::new(Gathering {
        remaining: parts.len(),
        values: vec![None; parts.len()],
        settler: Some(settler),
    }));

    for (index, (_, part)) in parts.into_iter().enumerate() {
        let state = state.clone();
        let names = names.clone();
        part.on_settle(move |outcome| {
            let finished = {
                let mut gathering = state.borrow_mut();
                match outcome {
                    Err(error) => gathering.settler.take().map(|s| (s, Err(error.clone()))),
                    Ok(value) => {
                        gathering.values[index] = Some(value.clone());
                        gathering.remaining -= 1;
                        if gathering.remaining == 0 {
                            let record = assemble(&names, &mut gathering.values);
                            gathering.settler.take().map(|s| (s, Ok(record)))
                        } else {
                            None
                        }
                    }
                }
            };
            if let Some((settler, outcome)) = finished {
                settler.settle(outcome);
            }
        });
    }
    combined
}

fn assemble(names: &[Option<String>], values: &mut [Option<Value>]) -> Value {
    let mut record = Map::new();
    for (name, value) in names.iter().zip(values.iter_mut()) {
        let value = value.take().unwrap_or(Value::Null);
        match (name, value) {
            (Some(name), value) => {
                record.insert(name.clone(), value);
            }
            (None, Value::Object(fields)) => record.extend(fields),
            (None, _) => {}
        }
    }
    Value::Object(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectError;
    use serde_json::json;

    #[test]
    fn empty_batch_has_no_result() {
        assert!(Aggregator::new().combine().is_none());
        assert!(Aggregator::new()
            .chain_after(Some(&Deferred::resolved(1)))
            .is_none());
    }

    #[test]
    fn batch_resolves_with_named_record() {
        let mut batch = Aggregator::new();
        batch.push("a", Deferred::resolved(1));
        batch.push("b", Deferred::resolved(json!({"x": true})));
        assert_eq!(batch.names().collect::<Vec<_>>(), vec!["a", "b"]);

        let combined = batch.combine().unwrap();
        assert_eq!(combined.outcome(), Some(Ok(json!({"a": 1, "b": {"x": true}}))));
    }

    #[test]
    fn first_failure_rejects_batch() {
        let (pending, settler) = Deferred::pending();
        let mut batch = Aggregator::new();
        batch.push("slow", pending);
        batch.push("broken", Deferred::rejected("nope"));

        let combined = batch.combine().unwrap();
        assert_eq!(combined.outcome(), Some(Err(EffectError::new("nope"))));

        settler.resolve(1);
        assert_eq!(combined.outcome(), Some(Err(EffectError::new("nope"))));
    }

    #[test]
    fn chained_batch_waits_for_previous() {
        let (previous, settle_previous) = Deferred::pending();
        let mut batch = Aggregator::new();
        batch.push("fetch", Deferred::resolved(42));

        let chained = batch.chain_after(Some(&previous)).unwrap();
        assert!(!chained.is_settled());

        settle_previous.reject("previous failed");
        assert_eq!(chained.outcome(), Some(Ok(json!({"fetch": 42}))));
    }

    #[test]
    fn merge_unions_object_parts() {
        let (late, settler) = Deferred::pending();
        let merged = merge(vec![Deferred::resolved(json!({"a": 1, "b": 1})), late]);
        assert!(!merged.is_settled());

        settler.resolve(json!({"b": 2}));
        assert_eq!(merged.outcome(), Some(Ok(json!({"a": 1, "b": 2}))));
    }

    #[test]
    fn all_of_nothing_is_empty_record() {
        assert_eq!(all(Vec::new()).outcome(), Some(Ok(json!({}))));
    }
}

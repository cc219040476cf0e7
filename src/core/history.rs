//! Transition history tracking.
//!
//! Every dispatch step that changes the active path is recorded as a
//! [`TransitionRecord`]. History values are immutable: `record` returns a new
//! history with the record appended.

use super::state::StateValue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Record of one dispatch step that changed the machine's state.
///
/// # Example
///
/// ```rust
/// use hierarch::core::{StateValue, TransitionRecord};
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     from: StateValue::state("green"),
///     to: StateValue::state("yellow"),
///     event: "TIMER".to_string(),
///     change: 1,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to.to_string(), "yellow");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransitionRecord {
    /// State shape before the step
    pub from: StateValue,
    /// State shape after the step
    pub to: StateValue,
    /// Name of the event that drove the step
    pub event: String,
    /// Change counter after the step
    pub change: u64,
    /// When the step completed
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of state-changing steps.
///
/// # Example
///
/// ```rust
/// use hierarch::core::{StateValue, TransitionHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let step = |from: &str, to: &str, change: u64| TransitionRecord {
///     from: StateValue::state(from),
///     to: StateValue::state(to),
///     event: "TIMER".to_string(),
///     change,
///     timestamp: Utc::now(),
/// };
///
/// let history = TransitionHistory::new()
///     .record(step("green", "yellow", 1))
///     .record(step("yellow", "red", 2));
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 3);
/// assert_eq!(path[0], &StateValue::state("green"));
/// assert_eq!(path[2], &StateValue::state("red"));
/// ```
#[derive(Clone, Debug, Default, Serialize)]
pub struct TransitionHistory {
    records: Vec<TransitionRecord>,
}

impl TransitionHistory {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Record a step, returning a new history.
    ///
    /// The existing history is left untouched.
    pub fn record(&self, record: TransitionRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        Self { records }
    }

    /// Keep only the most recent `limit` records, returning a new history.
    pub fn retain_last(&self, limit: usize) -> Self {
        let skip = self.records.len().saturating_sub(limit);
        Self {
            records: self.records[skip..].to_vec(),
        }
    }

    /// States traversed: the first `from`, then every `to` in order.
    pub fn get_path(&self) -> Vec<&StateValue> {
        let mut path = Vec::new();
        if let Some(first) = self.records.first() {
            path.push(&first.from);
        }
        for record in &self.records {
            path.push(&record.to);
        }
        path
    }

    /// Time between the first and last recorded step.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.first(), self.records.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(from: &str, to: &str, change: u64) -> TransitionRecord {
        TransitionRecord {
            from: StateValue::state(from),
            to: StateValue::state(to),
            event: "next".to_string(),
            change,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = TransitionHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = TransitionHistory::new();
        let next = history.record(step("a", "b", 1));

        assert_eq!(history.len(), 0);
        assert_eq!(next.len(), 1);
        assert_eq!(next.last().map(|r| r.change), Some(1));
    }

    #[test]
    fn path_follows_records() {
        let history = TransitionHistory::new()
            .record(step("a", "b", 1))
            .record(step("b", "c", 2));

        let names: Vec<String> = history.get_path().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn retain_last_drops_oldest() {
        let history = TransitionHistory::new()
            .record(step("a", "b", 1))
            .record(step("b", "c", 2))
            .record(step("c", "d", 3));

        let trimmed = history.retain_last(2);
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed.records()[0].change, 2);
        assert_eq!(history.retain_last(10).len(), 3);
    }

    #[test]
    fn duration_spans_first_to_last() {
        let start = Utc::now();
        let mut first = step("a", "b", 1);
        first.timestamp = start;
        let mut second = step("b", "c", 2);
        second.timestamp = start + chrono::Duration::seconds(5);

        let history = TransitionHistory::new().record(first).record(second);
        assert_eq!(history.duration(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn history_serializes_records() {
        let history = TransitionHistory::new().record(step("a", "b", 1));
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["records"][0]["to"], "b");
        assert_eq!(json["records"][0]["change"], 1);
    }
}

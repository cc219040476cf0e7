//! Settle-once deferred results.
//!
//! A [`Deferred`] is the single-threaded result of an entry effect. It starts
//! pending or already settled. A pending deferred is settled exactly once
//! through its [`Settler`]. Interested parties either register a callback
//! with [`Deferred::on_settle`] or `.await` the deferred.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use thiserror::Error;

/// Failure reported by an effect.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct EffectError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

impl EffectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: Value::Null,
        }
    }

    pub fn with_detail(message: impl Into<String>, detail: impl Into<Value>) -> Self {
        Self {
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn abandoned() -> Self {
        Self::new("effect was abandoned before it settled")
    }
}

impl From<&str> for EffectError {
    fn from(message: &str) -> Self {
        EffectError::new(message)
    }
}

impl From<String> for EffectError {
    fn from(message: String) -> Self {
        EffectError::new(message)
    }
}

/// Settled value of a deferred.
pub type Outcome = Result<Value, EffectError>;

type Waiter = Box<dyn FnOnce(&Outcome)>;

#[derive(Default)]
struct Slot {
    outcome: Option<Outcome>,
    waiters: Vec<Waiter>,
    /// Task awaiting this deferred. Each poll replaces it.
    waker: Option<Waker>,
}

/// Single-threaded settle-once result.
///
/// # Example
///
/// ```rust
/// use hierarch::effects::Deferred;
/// use serde_json::json;
///
/// let (deferred, settler) = Deferred::pending();
/// assert!(!deferred.is_settled());
///
/// settler.resolve(json!(42));
/// assert_eq!(deferred.outcome(), Some(Ok(json!(42))));
/// ```
#[derive(Clone)]
pub struct Deferred {
    slot: Rc<RefCell<Slot>>,
}

impl Deferred {
    /// A pending deferred and the handle that settles it.
    pub fn pending() -> (Deferred, Settler) {
        let deferred = Deferred::empty();
        let settler = Settler {
            target: deferred.clone(),
        };
        (deferred, settler)
    }

    pub fn resolved(value: impl Into<Value>) -> Self {
        Self::settled(Ok(value.into()))
    }

    pub fn rejected(error: impl Into<EffectError>) -> Self {
        Self::settled(Err(error.into()))
    }

    pub fn settled(outcome: Outcome) -> Self {
        let deferred = Deferred::empty();
        deferred.slot.borrow_mut().outcome = Some(outcome);
        deferred
    }

    fn empty() -> Self {
        Deferred {
            slot: Rc::default(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot.borrow().outcome.is_some()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.slot.borrow().outcome.clone()
    }

    /// Run `callback` once this deferred settles. Runs immediately if it has
    /// already settled.
    pub fn on_settle<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome) + 'static,
    {
        let settled = self.slot.borrow().outcome.clone();
        match settled {
            Some(outcome) => callback(&outcome),
            None => self.slot.borrow_mut().waiters.push(Box::new(callback)),
        }
    }

    /// Settle with `outcome`. Later calls are ignored.
    pub(crate) fn settle(&self, outcome: Outcome) {
        let (waiters, waker) = {
            let mut slot = self.slot.borrow_mut();
            if slot.outcome.is_some() {
                return;
            }
            slot.outcome = Some(outcome.clone());
            (std::mem::take(&mut slot.waiters), slot.waker.take())
        };
        for waiter in waiters {
            waiter(&outcome);
        }
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub fn ptr_eq(&self, other: &Deferred) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot.borrow().outcome {
            Some(Ok(value)) => f.debug_tuple("Deferred::Resolved").field(value).finish(),
            Some(Err(error)) => f.debug_tuple("Deferred::Rejected").field(error).finish(),
            None => f.write_str("Deferred::Pending"),
        }
    }
}

impl Future for Deferred {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        if let Some(outcome) = self.outcome() {
            return Poll::Ready(outcome);
        }
        let mut slot = self.slot.borrow_mut();
        let stale = slot
            .waker
            .as_ref()
            .map_or(true, |waker| !waker.will_wake(cx.waker()));
        if stale {
            slot.waker = Some(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Write side of a pending [`Deferred`].
///
/// Dropping a settler without settling rejects the deferred as abandoned, so
/// nothing waits on it forever.
pub struct Settler {
    target: Deferred,
}

impl Settler {
    pub fn resolve(self, value: impl Into<Value>) {
        self.target.settle(Ok(value.into()));
    }

    pub fn reject(self, error: impl Into<EffectError>) {
        self.target.settle(Err(error.into()));
    }

    pub fn settle(self, outcome: Outcome) {
        self.target.settle(outcome);
    }
}

impl Drop for Settler {
    fn drop(&mut self) {
        self.target.settle(Err(EffectError::abandoned()));
    }
}

impl fmt::Debug for Settler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler").field("target", &self.target).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::Wake;

    #[test]
    fn settles_only_once() {
        let (deferred, settler) = Deferred::pending();
        settler.resolve(1);
        deferred.settle(Ok(json!(2)));
        assert_eq!(deferred.outcome(), Some(Ok(json!(1))));
    }

    #[test]
    fn waiters_run_on_settle() {
        let (deferred, settler) = Deferred::pending();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        deferred.on_settle(move |outcome| *sink.borrow_mut() = Some(outcome.clone()));

        assert!(seen.borrow().is_none());
        settler.reject("boom");
        assert_eq!(*seen.borrow(), Some(Err(EffectError::new("boom"))));
    }

    #[test]
    fn late_waiter_runs_immediately() {
        let deferred = Deferred::resolved("done");
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        deferred.on_settle(move |_| seen.set(seen.get() + 1));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dropped_settler_rejects() {
        let (deferred, settler) = Deferred::pending();
        drop(settler);
        assert_eq!(deferred.outcome(), Some(Err(EffectError::abandoned())));
    }

    #[test]
    fn waiter_may_inspect_deferred() {
        let (deferred, settler) = Deferred::pending();
        let observed = deferred.clone();
        let saw_settled = Rc::new(Cell::new(false));
        let flag = saw_settled.clone();
        deferred.on_settle(move |_| flag.set(observed.is_settled()));

        settler.resolve(true);
        assert!(saw_settled.get());
    }

    #[test]
    fn effect_error_serializes_without_empty_detail() {
        let error = EffectError::new("timeout");
        assert_eq!(serde_json::to_value(&error).unwrap(), json!({"message": "timeout"}));
        assert_eq!(error.to_string(), "timeout");
    }

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn repeated_polls_keep_one_waker() {
        let (deferred, settler) = Deferred::pending();
        let wakes = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(wakes.clone());
        let mut cx = Context::from_waker(&waker);
        let mut future = Box::pin(deferred.clone());
        for _ in 0..5 {
            assert!(future.as_mut().poll(&mut cx).is_pending());
        }
        assert!(deferred.slot.borrow().waiters.is_empty());
        assert!(deferred.slot.borrow().waker.is_some());

        settler.resolve(1);
        assert_eq!(wakes.0.load(Ordering::SeqCst), 1);
        assert!(deferred.slot.borrow().waker.is_none());
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(Ok(json!(1))));
    }

    #[tokio::test]
    async fn awaiting_settled_deferred_yields_outcome() {
        let (deferred, settler) = Deferred::pending();
        settler.resolve(json!("ok"));
        assert_eq!(deferred.await, Ok(json!("ok")));
    }

    #[tokio::test]
    async fn awaiting_wakes_when_settled_later() {
        let (deferred, settler) = Deferred::pending();
        let local = tokio::task::LocalSet::new();
        let outcome = local
            .run_until(async move {
                let waiting = tokio::task::spawn_local(deferred);
                tokio::task::yield_now().await;
                settler.resolve(json!(5));
                waiting.await
            })
            .await;
        assert_eq!(outcome.unwrap(), Ok(json!(5)));
    }
}

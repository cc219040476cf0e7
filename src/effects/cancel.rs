//! Single-threaded cancellation tokens.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
struct TokenState {
    cancelled: Cell<bool>,
    callbacks: RefCell<Vec<Callback>>,
}

/// Cancellation signal shared by everything bound to one lifetime.
///
/// Each instance node owns a token. Subscriptions and effects started by the
/// node watch it, and it fires when the node is torn down. Clones share the
/// same signal.
///
/// # Example
///
/// ```rust
/// use hierarch::effects::CancellationToken;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let token = CancellationToken::new();
/// let child = token.child_token();
/// let fired = Rc::new(Cell::new(false));
/// let flag = fired.clone();
/// child.on_cancel(move || flag.set(true));
///
/// token.cancel();
/// assert!(child.is_cancelled());
/// assert!(fired.get());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Rc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }

    /// Fire the token. Callbacks run once, in registration order. Cancelling
    /// twice is a no-op.
    pub fn cancel(&self) {
        if self.state.cancelled.replace(true) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.state.callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    /// Run `callback` when the token fires. If it already fired, the callback
    /// runs immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        if self.is_cancelled() {
            callback();
        } else {
            self.state.callbacks.borrow_mut().push(Box::new(callback));
        }
    }

    /// Token that fires with this one but can also be cancelled on its own.
    pub fn child_token(&self) -> CancellationToken {
        let child = CancellationToken::new();
        let weak: Weak<TokenState> = Rc::downgrade(&child.state);
        self.on_cancel(move || {
            if let Some(state) = weak.upgrade() {
                CancellationToken { state }.cancel();
            }
        });
        child
    }

    pub fn ptr_eq(&self, other: &CancellationToken) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_run_once_in_order() {
        let token = CancellationToken::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            token.on_cancel(move || log.borrow_mut().push(i));
        }

        token.cancel();
        token.cancel();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn late_callback_runs_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        token.on_cancel(move || flag.set(true));
        assert!(fired.get());
    }

    #[test]
    fn child_cancel_does_not_reach_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn callback_may_register_on_same_token() {
        let token = CancellationToken::new();
        let fired = Rc::new(Cell::new(0));
        let inner_token = token.clone();
        let count = fired.clone();
        token.on_cancel(move || {
            let count = count.clone();
            inner_token.on_cancel(move || count.set(count.get() + 1));
        });

        token.cancel();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn clones_share_signal() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.ptr_eq(&clone));
    }
}

//! Interpreter errors.

use crate::core::StateId;
use thiserror::Error;

/// Errors raised while starting a machine or dispatching into it.
///
/// Configuration errors are fatal: they mean the chart cannot be interpreted
/// as written. Unmatched events and stale effect results are not errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InterpreterError {
    #[error("State {0} is not part of this chart")]
    UnknownState(StateId),

    #[error("Mapper registered on '{state}' needs a primitive child, found {found}")]
    UnsupportedMapper { state: String, found: &'static str },

    #[error("Entering '{state}' exceeds the nesting limit of {limit}")]
    DepthExceeded { state: String, limit: usize },

    #[error("Always-targets left '{state}' more than {limit} times in a row")]
    AlwaysLoop { state: String, limit: usize },

    #[error("Machine is already dispatching an event. Deliver through an EventSink instead")]
    Reentrant,

    #[error("Machine has been aborted")]
    Aborted,
}

impl InterpreterError {
    /// True for errors caused by the chart itself rather than by how the
    /// machine was driven.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            InterpreterError::UnknownState(_)
                | InterpreterError::UnsupportedMapper { .. }
                | InterpreterError::DepthExceeded { .. }
                | InterpreterError::AlwaysLoop { .. }
        )
    }
}

//! Chart violations.

use crate::core::StateId;
use thiserror::Error;

/// Problems found when validating a chart before it is started.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChartViolation {
    #[error("State '{name}' is declared but never defined")]
    Undefined { name: String },

    #[error("State declared at position {index} has an empty name")]
    EmptyName { index: usize },

    #[error("State '{from}' delegates to {target}, which is not declared on this chart")]
    UnknownTarget { from: String, target: StateId },

    #[error("Definition supplied for {id}, which is not declared on this chart")]
    StrayDefinition { id: StateId },

    #[error("Delegation from '{name}' loops back to itself")]
    DelegationCycle { name: String },
}

//! Validation of charts before they run.
//!
//! Chart problems are configuration errors. Rather than stopping at the first
//! one, every rule is checked and all violations are reported together, using
//! Stillwater's `Validation` to accumulate them.
//!
//! # Example
//!
//! ```rust
//! use hierarch::builder::ChartBuilder;
//! use hierarch::validation::ChartViolation;
//!
//! let mut chart = ChartBuilder::new();
//! let root = chart.declare("Root");
//! chart.declare("Forgotten");
//! chart.define(root, |_| ());
//!
//! let error = chart.build().unwrap_err();
//! assert_eq!(
//!     error.violations(),
//!     &[ChartViolation::Undefined { name: "Forgotten".to_string() }]
//! );
//! ```

mod rules;
mod violations;

pub(crate) use rules::{validate_states, DeclaredState};
pub use rules::ChartValidation;
pub use violations::ChartViolation;

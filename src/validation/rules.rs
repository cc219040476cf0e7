//! Chart rules checked with `Validation`.

use crate::core::StateId;
use crate::validation::violations::ChartViolation;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Outcome of validating a chart: success, or every violation found.
pub type ChartValidation = Validation<(), NonEmptyVec<ChartViolation>>;

/// What validation needs to know about one declared state.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DeclaredState<'a> {
    pub name: &'a str,
    pub defined: bool,
    pub delegate: Option<StateId>,
}

/// Check every rule, accumulating ALL violations.
pub(crate) fn validate_states(states: &[DeclaredState<'_>], stray: &[StateId]) -> ChartValidation {
    let mut checks: Vec<ChartValidation> = Vec::new();

    for (index, state) in states.iter().enumerate() {
        if state.name.is_empty() {
            checks.push(Validation::fail(ChartViolation::EmptyName { index }));
        }

        let check = if state.defined {
            Validation::success(())
        } else {
            Validation::fail(ChartViolation::Undefined {
                name: state.name.to_string(),
            })
        };
        checks.push(check);

        if let Some(target) = state.delegate {
            if target.index() >= states.len() {
                checks.push(Validation::fail(ChartViolation::UnknownTarget {
                    from: state.name.to_string(),
                    target,
                }));
            } else if delegates_to_itself(states, index) {
                checks.push(Validation::fail(ChartViolation::DelegationCycle {
                    name: state.name.to_string(),
                }));
            }
        }
    }

    for id in stray {
        checks.push(Validation::fail(ChartViolation::StrayDefinition { id: *id }));
    }

    Validation::all_vec(checks).map(|_| ())
}

/// Follow the delegation chain from `start`. Reports a cycle only for states
/// that are themselves part of the loop.
fn delegates_to_itself(states: &[DeclaredState<'_>], start: usize) -> bool {
    let mut cursor = start;
    for _ in 0..states.len() {
        match states.get(cursor).and_then(|state| state.delegate) {
            Some(next) if next.index() == start => return true,
            Some(next) => cursor = next.index(),
            None => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defined(name: &str) -> DeclaredState<'_> {
        DeclaredState {
            name,
            defined: true,
            delegate: None,
        }
    }

    fn delegating(name: &str, to: u32) -> DeclaredState<'_> {
        DeclaredState {
            name,
            defined: true,
            delegate: Some(StateId(to)),
        }
    }

    #[test]
    fn well_formed_states_pass() {
        let states = [defined("Off"), defined("On"), delegating("Alias", 1)];
        assert!(validate_states(&states, &[]).is_success());
    }

    #[test]
    fn validation_accumulates_all_violations() {
        let states = [
            DeclaredState {
                name: "Open",
                defined: false,
                delegate: None,
            },
            defined(""),
            delegating("Broken", 9),
        ];

        let result = validate_states(&states, &[StateId(12)]);

        match result {
            Validation::Failure(errors) => {
                assert_eq!(errors.len(), 4);
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, ChartViolation::Undefined { name } if name == "Open")));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, ChartViolation::EmptyName { index: 1 })));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, ChartViolation::UnknownTarget { .. })));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, ChartViolation::StrayDefinition { .. })));
            }
            Validation::Success(_) => panic!("Expected failures, got success"),
        }
    }

    #[test]
    fn delegation_loop_is_reported_for_each_member() {
        let states = [delegating("A", 1), delegating("B", 0), delegating("C", 0)];

        let result = validate_states(&states, &[]);
        assert!(result.is_failure());
        if let Validation::Failure(errors) = result {
            let looping: Vec<_> = errors
                .iter()
                .filter_map(|e| match e {
                    ChartViolation::DelegationCycle { name } => Some(name.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(looping, vec!["A", "B"]);
        }
    }

    #[test]
    fn self_delegation_is_a_cycle() {
        let states = [delegating("Loop", 0)];
        assert!(validate_states(&states, &[]).is_failure());
    }
}

//! Running a state descriptor once.

use crate::builder::chart::Body;
use crate::builder::{Chart, Scope};
use crate::core::{Completion, Context, Directive, StateId};
use crate::interpreter::error::InterpreterError;

/// Directives emitted by one descriptor run, plus how it completed.
#[derive(Debug)]
pub(crate) struct Evaluation {
    pub(crate) directives: Vec<Directive>,
    pub(crate) completion: Completion,
}

/// Run the descriptor for `id` with a fresh scope.
///
/// A delegating state emits nothing and completes by entering its target.
pub(crate) fn evaluate(
    chart: &Chart,
    id: StateId,
    context: Context<'_>,
) -> Result<Evaluation, InterpreterError> {
    let entry = chart.entry(id).ok_or(InterpreterError::UnknownState(id))?;
    match &entry.body {
        Body::Delegate(target) => Ok(Evaluation {
            directives: Vec::new(),
            completion: Completion::Enter(*target),
        }),
        Body::Describe(descriptor) => {
            let mut scope = Scope::new(&entry.name, context);
            let completion = descriptor(&mut scope);
            Ok(Evaluation {
                directives: scope.into_directives(),
                completion,
            })
        }
    }
}

//! This module provides functions for analyzing compiled machines to detect likely mistakes
//! that are still legal definitions: states that can never be entered, final states that can
//! never be reached, and machines without any transition at all.
//!
//! Everything found here is reported as a warning; analysis never stops a machine from being
//! simulated.

use std::collections::{BTreeSet, HashMap};

use crate::diagnostics::Diagnostic;
use crate::machine::Machine;
use crate::types::State;

/// Represents the issues that can be found during the analysis of a machine.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisWarning {
    /// The machine has no transitions, so no branch can ever move.
    NoTransitions,
    /// States that cannot be reached from the initial state.
    UnreachableStates(Vec<State>),
    /// Final states that cannot be reached from the initial state, so can never accept.
    UnreachableFinalStates(Vec<State>),
}

impl From<AnalysisWarning> for Diagnostic {
    /// Converts an `AnalysisWarning` into a located-less warning diagnostic.
    fn from(warning: AnalysisWarning) -> Self {
        let mut diagnostic = match &warning {
            AnalysisWarning::NoTransitions => Diagnostic::warning("no transitions defined", None),
            AnalysisWarning::UnreachableStates(states) => Diagnostic::warning(
                format!("unreachable states: {}", join(states)),
                None,
            ),
            AnalysisWarning::UnreachableFinalStates(states) => Diagnostic::warning(
                format!("final states can never be reached: {}", join(states)),
                None,
            ),
        };
        if warning == AnalysisWarning::NoTransitions {
            diagnostic.help("consider defining one with d(...) = ...");
        }
        diagnostic
    }
}

fn join(states: &[State]) -> String {
    states
        .iter()
        .map(State::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Analyzes a compiled `Machine` and returns a warning diagnostic for every issue found.
pub fn analyze(machine: &Machine) -> Vec<Diagnostic> {
    [
        check_transitions,
        check_unreachable_states,
        check_unreachable_final_states,
    ]
    .iter()
    .filter_map(|f| f(machine).err())
    .map(Diagnostic::from)
    .collect()
}

/// Checks that the machine defines at least one transition.
fn check_transitions(machine: &Machine) -> Result<(), AnalysisWarning> {
    if machine.transition_count() == 0 {
        return Err(AnalysisWarning::NoTransitions);
    }

    Ok(())
}

/// Collects every state reachable from the initial state, ignoring letters and stack or tape
/// contents.
fn reachable_states(machine: &Machine) -> BTreeSet<State> {
    let mut successors: HashMap<State, Vec<State>> = HashMap::new();
    for edge in machine.edges() {
        successors.entry(edge.from).or_default().push(edge.to);
    }

    let mut visited = BTreeSet::new();
    let mut queue = vec![machine.initial_state().clone()];

    while let Some(state) = queue.pop() {
        if !visited.insert(state.clone()) {
            continue;
        }

        if let Some(next) = successors.get(&state) {
            queue.extend(next.iter().filter(|s| !visited.contains(*s)).cloned());
        }
    }

    visited
}

/// Checks that every declared state can be reached from the initial state.
fn check_unreachable_states(machine: &Machine) -> Result<(), AnalysisWarning> {
    let reachable = reachable_states(machine);
    let unreachable: Vec<State> = machine
        .states()
        .difference(&reachable)
        .cloned()
        .collect();

    if !unreachable.is_empty() {
        return Err(AnalysisWarning::UnreachableStates(unreachable));
    }

    Ok(())
}

/// Checks that at least the final states can be reached, otherwise nothing is ever accepted
/// that is not accepted by the seed configuration.
fn check_unreachable_final_states(machine: &Machine) -> Result<(), AnalysisWarning> {
    let Some(final_states) = machine.final_states() else {
        return Ok(());
    };

    let reachable = reachable_states(machine);
    let unreachable: Vec<State> = final_states.difference(&reachable).cloned().collect();

    if !unreachable.is_empty() {
        return Err(AnalysisWarning::UnreachableFinalStates(unreachable));
    }

    Ok(())
}

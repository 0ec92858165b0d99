//! Acceptance predicates, one per machine family.
//!
//! Each is evaluated exactly once, when a configuration is built, and the answer is stored on
//! the configuration. Rejected configurations are never re-examined.

use crate::machine::{Fa, Pda, PdaAcceptance, Tm};
use crate::types::{State, Symbol};

/// An FA accepts once all input is consumed in a final state.
pub fn fa_accepts(fa: &Fa, state: &State, position: usize, input_len: usize) -> bool {
    position == input_len && fa.is_final(state)
}

/// A PDA accepts once all input is consumed and the mode it declares is satisfied: either a
/// final state, or a stack holding nothing but the initial marker.
pub fn pda_accepts(
    pda: &Pda,
    state: &State,
    stack: &[Symbol],
    position: usize,
    input_len: usize,
) -> bool {
    if position != input_len {
        return false;
    }

    match pda.acceptance() {
        PdaAcceptance::FinalState { states } => states.contains(state),
        PdaAcceptance::EmptyStack => matches!(stack, [only] if only == pda.initial_stack()),
    }
}

/// A TM accepts as soon as it enters a final state, wherever its head is.
pub fn tm_accepts(tm: &Tm, state: &State) -> bool {
    tm.is_final(state)
}

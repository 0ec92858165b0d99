use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::acceptance::pda_accepts;
use super::path::{PathArena, PathId};
use super::{Buckets, Configuration};
use crate::machine::{Pda, PdaTarget};
use crate::types::{Letter, State, Status, Symbol, EPSILON_DISPLAY};

/// One branch of a pushdown automaton run. The stack is never empty; its top is the last
/// element.
#[derive(Debug, Clone)]
pub struct PdaConfiguration {
    state: State,
    input: Arc<[char]>,
    position: usize,
    stack: Vec<Symbol>,
    path: Option<PathId>,
    depth: usize,
    accepted: bool,
    repr: OnceCell<String>,
}

impl PdaConfiguration {
    fn new(pda: &Pda, state: State, input: Arc<[char]>, position: usize, stack: Vec<Symbol>) -> Self {
        let accepted = pda_accepts(pda, &state, &stack, position, input.len());
        Self {
            state,
            input,
            position,
            stack,
            path: None,
            depth: 0,
            accepted,
            repr: OnceCell::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Stack contents, bottom first.
    pub fn stack(&self) -> &[Symbol] {
        &self.stack
    }

    pub fn top(&self) -> Option<&Symbol> {
        self.stack.last()
    }

    pub fn remaining(&self) -> &[char] {
        &self.input[self.position..]
    }
}

impl Configuration for PdaConfiguration {
    fn state(&self) -> &State {
        &self.state
    }

    fn accepted(&self) -> bool {
        self.accepted
    }

    fn repr(&self) -> &str {
        self.repr.get_or_init(|| {
            let stack: Vec<&str> = self.stack.iter().map(Symbol::as_str).collect();
            let remaining: String = self.remaining().iter().collect();
            format!("{} [{}] >{}", self.state, stack.join(","), remaining)
        })
    }

    fn path(&self) -> Option<PathId> {
        self.path
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

/// A transition taken by a PDA branch, with the stack top it popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdaStep {
    pub from: State,
    pub letter: Option<Letter>,
    pub top: Symbol,
    pub target: PdaTarget,
}

impl fmt::Display for PdaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = self.letter.as_ref().map_or(EPSILON_DISPLAY, Letter::as_str);
        let push = if self.target.push.is_empty() {
            EPSILON_DISPLAY.to_string()
        } else {
            let top_first: Vec<&str> = self.target.push.iter().rev().map(Symbol::as_str).collect();
            top_first.join(" ")
        };
        write!(
            f,
            "{} -{},{}/{}-> {}",
            self.from, letter, self.top, push, self.target.state
        )
    }
}

/// Lockstep simulation of a pushdown automaton on one input.
#[derive(Debug, Clone)]
pub struct PdaSimulation {
    machine: Arc<Pda>,
    input: Arc<[char]>,
    buckets: Buckets<PdaConfiguration>,
    paths: PathArena<PdaStep>,
}

impl PdaSimulation {
    pub fn new(machine: Arc<Pda>, input: &str) -> Self {
        let input: Arc<[char]> = input.chars().collect();
        let seed = PdaConfiguration::new(
            &machine,
            machine.initial_state().clone(),
            input.clone(),
            0,
            vec![machine.initial_stack().clone()],
        );

        Self {
            buckets: Buckets::seeded(seed),
            machine,
            input,
            paths: PathArena::new(),
        }
    }

    pub fn machine(&self) -> &Arc<Pda> {
        &self.machine
    }

    pub fn input(&self) -> String {
        self.input.iter().collect()
    }

    /// Expands every live branch by one transition. A move that would leave the stack empty
    /// is not taken and rejects the branch it started from, whatever its other moves produce.
    pub fn step(&mut self) -> Status {
        let pda = &*self.machine;
        let input = &self.input;
        let paths = &mut self.paths;

        self.buckets.advance(|from, out| {
            let Some(top) = from.stack.last() else {
                return true;
            };
            let Some(successors) = pda.successors(&from.state, top) else {
                return false;
            };

            let mut emptied = false;
            let mut take = |letter: Option<&Letter>, target: &PdaTarget, position: usize| {
                let below = &from.stack[..from.stack.len() - 1];
                if below.is_empty() && target.push.is_empty() {
                    trace!(state = %from.state, "pda move would empty the stack");
                    emptied = true;
                    return;
                }

                let mut stack = Vec::with_capacity(below.len() + target.push.len());
                stack.extend_from_slice(below);
                stack.extend_from_slice(&target.push);

                let edge = PdaStep {
                    from: from.state.clone(),
                    letter: letter.cloned(),
                    top: top.clone(),
                    target: target.clone(),
                };
                trace!(%edge, "pda transition");

                let mut next =
                    PdaConfiguration::new(pda, target.state.clone(), input.clone(), position, stack);
                next.path = Some(paths.extend(from.path, edge));
                next.depth = from.depth + 1;
                out.push(next);
            };

            for target in successors.epsilon() {
                take(None, target, from.position);
            }

            if let Some(&c) = input.get(from.position) {
                let mut buf = [0; 4];
                if let Some((letter, targets)) = successors.letter_entry(c.encode_utf8(&mut buf)) {
                    for target in targets {
                        take(Some(letter), target, from.position + 1);
                    }
                }
            }
            emptied
        })
    }

    pub fn status(&self) -> Status {
        self.buckets.status()
    }

    pub fn buckets(&self) -> &Buckets<PdaConfiguration> {
        &self.buckets
    }

    pub fn frontier(&self) -> &[PdaConfiguration] {
        self.buckets.frontier()
    }

    pub fn accepted(&self) -> &[PdaConfiguration] {
        self.buckets.accepted()
    }

    pub fn rejected(&self) -> &[PdaConfiguration] {
        self.buckets.rejected()
    }

    pub fn path(&self, configuration: &PdaConfiguration) -> Vec<&PdaStep> {
        self.paths.trace(configuration.path)
    }

    pub fn path_labels(&self, configuration: &PdaConfiguration) -> Vec<String> {
        self.path(configuration).iter().map(ToString::to_string).collect()
    }
}

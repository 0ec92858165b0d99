use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::acceptance::fa_accepts;
use super::path::{PathArena, PathId};
use super::{Buckets, Configuration};
use crate::machine::{Fa, FaTarget};
use crate::types::{Letter, State, Status, EPSILON_DISPLAY};

/// One branch of a finite automaton run: a state and how much input has been read.
#[derive(Debug, Clone)]
pub struct FaConfiguration {
    state: State,
    input: Arc<[char]>,
    position: usize,
    path: Option<PathId>,
    depth: usize,
    accepted: bool,
    repr: OnceCell<String>,
}

impl FaConfiguration {
    fn new(fa: &Fa, state: State, input: Arc<[char]>, position: usize) -> Self {
        let accepted = fa_accepts(fa, &state, position, input.len());
        Self {
            state,
            input,
            position,
            path: None,
            depth: 0,
            accepted,
            repr: OnceCell::new(),
        }
    }

    /// Index of the next letter to read.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> &[char] {
        &self.input[self.position..]
    }
}

impl Configuration for FaConfiguration {
    fn state(&self) -> &State {
        &self.state
    }

    fn accepted(&self) -> bool {
        self.accepted
    }

    fn repr(&self) -> &str {
        self.repr.get_or_init(|| {
            let remaining: String = self.remaining().iter().collect();
            format!("{} >{}", self.state, remaining)
        })
    }

    fn path(&self) -> Option<PathId> {
        self.path
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

/// A transition taken by an FA branch. `letter` is `None` for an epsilon move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaStep {
    pub from: State,
    pub letter: Option<Letter>,
    pub target: FaTarget,
}

impl fmt::Display for FaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = self.letter.as_ref().map_or(EPSILON_DISPLAY, Letter::as_str);
        write!(f, "{} -{}-> {}", self.from, letter, self.target.state)
    }
}

/// Lockstep simulation of a finite automaton on one input.
#[derive(Debug, Clone)]
pub struct FaSimulation {
    machine: Arc<Fa>,
    input: Arc<[char]>,
    buckets: Buckets<FaConfiguration>,
    paths: PathArena<FaStep>,
}

impl FaSimulation {
    pub fn new(machine: Arc<Fa>, input: &str) -> Self {
        let input: Arc<[char]> = input.chars().collect();
        let seed = FaConfiguration::new(
            &machine,
            machine.initial_state().clone(),
            input.clone(),
            0,
        );

        Self {
            buckets: Buckets::seeded(seed),
            machine,
            input,
            paths: PathArena::new(),
        }
    }

    pub fn machine(&self) -> &Arc<Fa> {
        &self.machine
    }

    pub fn input(&self) -> String {
        self.input.iter().collect()
    }

    /// Expands every live branch by one transition, epsilon moves included.
    pub fn step(&mut self) -> Status {
        let fa = &*self.machine;
        let input = &self.input;
        let paths = &mut self.paths;

        self.buckets.advance(|from, out| {
            let Some(successors) = fa.successors(&from.state) else {
                return false;
            };

            let mut take = |letter: Option<&Letter>, target: &FaTarget, position: usize| {
                let edge = FaStep {
                    from: from.state.clone(),
                    letter: letter.cloned(),
                    target: target.clone(),
                };
                trace!(%edge, "fa transition");

                let mut next = FaConfiguration::new(fa, target.state.clone(), input.clone(), position);
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
            false
        })
    }

    pub fn status(&self) -> Status {
        self.buckets.status()
    }

    pub fn buckets(&self) -> &Buckets<FaConfiguration> {
        &self.buckets
    }

    pub fn frontier(&self) -> &[FaConfiguration] {
        self.buckets.frontier()
    }

    pub fn accepted(&self) -> &[FaConfiguration] {
        self.buckets.accepted()
    }

    pub fn rejected(&self) -> &[FaConfiguration] {
        self.buckets.rejected()
    }

    /// Transitions from the seed to `configuration`, oldest first.
    pub fn path(&self, configuration: &FaConfiguration) -> Vec<&FaStep> {
        self.paths.trace(configuration.path)
    }

    pub fn path_labels(&self, configuration: &FaConfiguration) -> Vec<String> {
        self.path(configuration).iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::machine::Machine;

    fn fa(src: &str) -> Arc<Fa> {
        match compile(src).machine {
            Some(Machine::Fa(fa)) => fa,
            other => panic!("expected a finite automaton, got {other:?}"),
        }
    }

    fn reprs(configs: &[FaConfiguration]) -> Vec<&str> {
        configs.iter().map(Configuration::repr).collect()
    }

    const SINGLE: &str = r#"
type = DFA
Q = {q0, q1}
E = {a}
F = {q1}
d(q0, a) = q1
"#;

    const EPSILON_FORK: &str = r#"
type = NFA
Q = {q0, q1, q2}
E = {a}
F = {q2}
d(q0, ~) = q1
d(q0, ~) = q2
"#;

    #[test]
    fn test_single_transition_accepts_after_one_step() {
        let mut sim = FaSimulation::new(fa(SINGLE), "a");
        assert_eq!(sim.status(), Status::Pending);
        assert_eq!(reprs(sim.frontier()), vec!["q0 >a"]);

        assert_eq!(sim.step(), Status::Accept);
        assert_eq!(reprs(sim.accepted()), vec!["q1 >"]);
        assert!(sim.frontier().is_empty());
        assert!(sim.rejected().is_empty());

        let labels = sim.path_labels(&sim.accepted()[0]);
        assert_eq!(labels, vec!["q0 -a-> q1"]);
        assert_eq!(sim.accepted()[0].depth(), 1);
    }

    #[test]
    fn test_accept_is_idempotent() {
        let mut sim = FaSimulation::new(fa(SINGLE), "a");
        sim.step();
        let accepted = reprs(sim.accepted()).join("|");

        for _ in 0..3 {
            assert_eq!(sim.step(), Status::Accept);
        }
        assert_eq!(reprs(sim.accepted()).join("|"), accepted);
        assert_eq!(sim.buckets().steps(), 1);
    }

    #[test]
    fn test_dead_end_is_rejected_for_good() {
        let mut sim = FaSimulation::new(fa(SINGLE), "b");
        assert_eq!(sim.step(), Status::Reject);
        assert_eq!(reprs(sim.rejected()), vec!["q0 >b"]);

        assert_eq!(sim.step(), Status::Reject);
        assert_eq!(sim.rejected().len(), 1);
        assert_eq!(sim.buckets().steps(), 1);
    }

    #[test]
    fn test_input_end_is_not_terminal_by_itself() {
        let mut sim = FaSimulation::new(fa(SINGLE), "aa");
        assert_eq!(sim.step(), Status::Pending);
        assert_eq!(reprs(sim.frontier()), vec!["q1 >a"]);
        assert_eq!(sim.step(), Status::Reject);
    }

    #[test]
    fn test_epsilon_moves_fork_the_frontier() {
        let mut sim = FaSimulation::new(fa(EPSILON_FORK), "a");
        assert_eq!(sim.step(), Status::Pending);

        assert!(sim.frontier().len() >= 2);
        assert_eq!(reprs(sim.frontier()), vec!["q1 >a", "q2 >a"]);
        assert_eq!(sim.buckets().in_state("q2").count(), 1);
        assert_eq!(sim.path_labels(&sim.frontier()[1]), vec!["q0 -ε-> q2"]);
    }

    #[test]
    fn test_empty_input_in_final_initial_state_accepts_immediately() {
        let src = "type = DFA\nQ = {q0}\nE = {a}\nF = {q0}\nd(q0, a) = q0";
        let sim = FaSimulation::new(fa(src), "");
        assert_eq!(sim.status(), Status::Accept);
        assert_eq!(reprs(sim.accepted()), vec!["q0 >"]);
    }

    #[test]
    fn test_fresh_simulations_agree() {
        let src = r#"
type = NFA
Q = {q0, q1, q2}
E = {0, 1}
F = {q2}
d(q0, 0) = {q0, q1}
d(q0, 1) = q0
d(q1, 1) = q2
"#;
        let machine = fa(src);
        let run = || {
            let mut sim = FaSimulation::new(machine.clone(), "0101");
            let mut trace = Vec::new();
            while !sim.step().is_terminal() {
                trace.push(reprs(sim.frontier()).join(","));
            }
            (trace, sim.status())
        };

        assert_eq!(run(), run());
        assert_eq!(run().1, Status::Accept);
    }
}

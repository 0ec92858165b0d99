use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::acceptance::tm_accepts;
use super::path::{PathArena, PathId};
use super::{Buckets, Configuration};
use crate::machine::{Tm, TmTarget};
use crate::types::{Direction, State, Status, Symbol};

/// One branch of a Turing machine run: a state, the tape and the head position on it.
///
/// The tape only grows. It always holds at least one cell and the head always points at one
/// of them.
#[derive(Debug, Clone)]
pub struct TmConfiguration {
    state: State,
    tape: Vec<Symbol>,
    head: usize,
    blank: Symbol,
    path: Option<PathId>,
    depth: usize,
    accepted: bool,
    repr: OnceCell<String>,
}

impl TmConfiguration {
    fn new(tm: &Tm, state: State, tape: Vec<Symbol>, head: usize) -> Self {
        let accepted = tm_accepts(tm, &state);
        Self {
            state,
            tape,
            head,
            blank: tm.blank().clone(),
            path: None,
            depth: 0,
            accepted,
            repr: OnceCell::new(),
        }
    }

    pub fn tape(&self) -> &[Symbol] {
        &self.tape
    }

    pub fn head(&self) -> usize {
        self.head
    }

    /// The symbol under the head.
    pub fn current(&self) -> &Symbol {
        &self.tape[self.head]
    }

    /// Writes `symbol` under the head, then moves it.
    fn apply(&self, symbol: &Symbol, direction: Direction) -> (Vec<Symbol>, usize) {
        let mut tape = self.tape.clone();
        let mut head = self.head;
        tape[head] = symbol.clone();

        match direction {
            Direction::Left => {
                if head == 0 {
                    tape.insert(0, self.blank.clone());
                } else {
                    head -= 1;
                }
            }
            Direction::Right => {
                head += 1;
                if head == tape.len() {
                    tape.push(self.blank.clone());
                }
            }
            Direction::Stay => {}
        }

        (tape, head)
    }
}

impl Configuration for TmConfiguration {
    fn state(&self) -> &State {
        &self.state
    }

    fn accepted(&self) -> bool {
        self.accepted
    }

    fn repr(&self) -> &str {
        self.repr.get_or_init(|| {
            let cells: Vec<String> = self
                .tape
                .iter()
                .enumerate()
                .map(|(i, symbol)| {
                    if i == self.head {
                        format!("[{symbol}]")
                    } else {
                        symbol.to_string()
                    }
                })
                .collect();
            format!(
                "{} [ {} {} {} ]",
                self.state,
                self.blank,
                cells.join(" "),
                self.blank
            )
        })
    }

    fn path(&self) -> Option<PathId> {
        self.path
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

/// A transition taken by a TM branch, with the symbol it read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmStep {
    pub from: State,
    pub read: Symbol,
    pub target: TmTarget,
}

impl fmt::Display for TmStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -{}/{},{}-> {}",
            self.from, self.read, self.target.write, self.target.direction, self.target.state
        )
    }
}

/// Lockstep simulation of a Turing machine on one input.
#[derive(Debug, Clone)]
pub struct TmSimulation {
    machine: Arc<Tm>,
    input: String,
    buckets: Buckets<TmConfiguration>,
    paths: PathArena<TmStep>,
}

impl TmSimulation {
    /// Seeds the tape with one cell per input character, or a single blank for empty input.
    pub fn new(machine: Arc<Tm>, input: &str) -> Self {
        let mut tape: Vec<Symbol> = input
            .chars()
            .map(|c| Symbol::from(c.to_string()))
            .collect();
        if tape.is_empty() {
            tape.push(machine.blank().clone());
        }

        let seed = TmConfiguration::new(&machine, machine.initial_state().clone(), tape, 0);

        Self {
            buckets: Buckets::seeded(seed),
            machine,
            input: input.to_string(),
            paths: PathArena::new(),
        }
    }

    pub fn machine(&self) -> &Arc<Tm> {
        &self.machine
    }

    pub fn input(&self) -> String {
        self.input.clone()
    }

    pub fn step(&mut self) -> Status {
        let tm = &*self.machine;
        let paths = &mut self.paths;

        self.buckets.advance(|from, out| {
            let read = from.current();
            for target in tm.successors(&from.state, read) {
                let (tape, head) = from.apply(&target.write, target.direction);

                let edge = TmStep {
                    from: from.state.clone(),
                    read: read.clone(),
                    target: target.clone(),
                };
                trace!(%edge, head, "tm transition");

                let mut next = TmConfiguration::new(tm, target.state.clone(), tape, head);
                next.path = Some(paths.extend(from.path, edge));
                next.depth = from.depth + 1;
                out.push(next);
            }
            false
        })
    }

    pub fn status(&self) -> Status {
        self.buckets.status()
    }

    pub fn buckets(&self) -> &Buckets<TmConfiguration> {
        &self.buckets
    }

    pub fn frontier(&self) -> &[TmConfiguration] {
        self.buckets.frontier()
    }

    pub fn accepted(&self) -> &[TmConfiguration] {
        self.buckets.accepted()
    }

    pub fn rejected(&self) -> &[TmConfiguration] {
        self.buckets.rejected()
    }

    pub fn path(&self, configuration: &TmConfiguration) -> Vec<&TmStep> {
        self.paths.trace(configuration.path)
    }

    pub fn path_labels(&self, configuration: &TmConfiguration) -> Vec<String> {
        self.path(configuration).iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::machine::Machine;

    fn tm(src: &str) -> Arc<Tm> {
        match compile(src).machine {
            Some(Machine::Tm(tm)) => tm,
            other => panic!("expected a Turing machine, got {other:?}"),
        }
    }

    fn reprs(configs: &[TmConfiguration]) -> Vec<&str> {
        configs.iter().map(Configuration::repr).collect()
    }

    const ANBNCN: &str = r#"
type = TM
Q = {q1, q2, q3, q4, q5, q6, qf}
E = {a, b, c}
T = {a, b, c, B, X, Y, Z}
F = {qf}
q0 = q1
B = B

d(q1, a) = (q2, X, R)
d(q1, Y) = (q5, Y, R)
d(q2, a) = (q2, a, R)
d(q2, b) = (q3, Y, R)
d(q2, Y) = (q2, Y, R)
d(q3, b) = (q3, b, R)
d(q3, c) = (q4, Z, L)
d(q3, Z) = (q3, Z, R)
d(q4, a) = (q4, a, L)
d(q4, b) = (q4, b, L)
d(q4, X) = (q1, X, R)
d(q4, Y) = (q4, Y, L)
d(q4, Z) = (q4, Z, L)
d(q5, Y) = (q5, Y, R)
d(q5, Z) = (q6, Z, R)
d(q6, B) = (qf, B, R)
d(q6, Z) = (q6, Z, R)
"#;

    fn run(sim: &mut TmSimulation) -> Status {
        for _ in 0..1000 {
            let status = sim.step();
            if status.is_terminal() {
                return status;
            }
        }
        sim.status()
    }

    #[test]
    fn test_anbncn_accepts_abc() {
        let mut sim = TmSimulation::new(tm(ANBNCN), "abc");
        assert_eq!(reprs(sim.frontier()), vec!["q1 [ B [a] b c B ]"]);

        assert_eq!(sim.step(), Status::Pending);
        assert_eq!(reprs(sim.frontier()), vec!["q2 [ B X [b] c B ]"]);

        assert_eq!(run(&mut sim), Status::Accept);
        let accepted = &sim.accepted()[0];
        assert_eq!(accepted.state().as_str(), "qf");
        assert_eq!(accepted.repr(), "qf [ B X Y Z B [B] B ]");
        assert_eq!(sim.path_labels(accepted).last().map(String::as_str), Some("q6 -B/B,R-> qf"));
    }

    #[test]
    fn test_anbncn_rejects_ab() {
        let mut sim = TmSimulation::new(tm(ANBNCN), "ab");
        assert_eq!(run(&mut sim), Status::Reject);
        assert_eq!(reprs(sim.rejected()), vec!["q3 [ B X Y [B] B ]"]);
    }

    #[test]
    fn test_empty_input_seeds_a_blank_cell() {
        let sim = TmSimulation::new(tm(ANBNCN), "");
        assert_eq!(sim.frontier()[0].tape(), &[Symbol::from("B")]);
        assert_eq!(sim.frontier()[0].head(), 0);
    }

    #[test]
    fn test_final_initial_state_accepts_seed() {
        let src = "type = TM\nQ = {q0}\nT = {a, B}\nF = {q0}\nd(q0, a) = (q0, a, R)";
        let mut sim = TmSimulation::new(tm(src), "a");
        assert_eq!(sim.status(), Status::Accept);
        assert_eq!(sim.step(), Status::Accept);
        assert_eq!(sim.buckets().steps(), 0);
    }

    #[test]
    fn test_moving_left_off_the_tape_prepends_blank() {
        let src = r#"
type = TM
Q = {q0, q1}
T = {a, b, B}
F = {q1}
d(q0, a) = (q1, b, L)
"#;
        let mut sim = TmSimulation::new(tm(src), "a");
        assert_eq!(sim.step(), Status::Accept);

        let accepted = &sim.accepted()[0];
        assert_eq!(accepted.head(), 0);
        assert_eq!(accepted.tape(), &[Symbol::from("B"), Symbol::from("b")]);
    }

    #[test]
    fn test_tape_never_shrinks_and_head_stays_on_tape() {
        let src = r#"
type = NTM
Q = {q0, q1}
T = {a, B}
F = {q1}
d(q0, a) = {(q0, a, L), (q0, B, R), (q0, a, S)}
d(q0, B) = {(q0, a, R), (q0, B, L)}
"#;
        let mut sim = TmSimulation::new(tm(src), "aa");
        let mut widest = 2;
        for _ in 0..5 {
            sim.step();
            for config in sim.frontier() {
                assert!(config.head() < config.tape().len());
                assert!(config.tape().len() >= 2);
                widest = widest.max(config.tape().len());
            }
        }
        assert!(widest > 2);
    }
}

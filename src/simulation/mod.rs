//! Step-by-step simulation of compiled machines.
//!
//! A simulation is bound to one machine and one input for its whole life. It starts from a
//! single seed configuration and every call to `step` expands each live configuration into all
//! of its successors at once, so every nondeterministic branch advances in lockstep. After a
//! step the previous frontier has been split into the next frontier, newly accepted
//! configurations and rejected dead ends.
//!
//! There is no reset: to run a different input, or a recompiled machine, build a new
//! simulation and drop the old one.

pub mod acceptance;
pub mod fa;
pub mod path;
pub mod pda;
pub mod tm;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

use crate::machine::{Machine, MachineKind};
use crate::types::{AutomataError, State, Status, MAX_EXECUTION_STEPS};

pub use fa::{FaConfiguration, FaSimulation, FaStep};
pub use path::{PathArena, PathId};
pub use pda::{PdaConfiguration, PdaSimulation, PdaStep};
pub use tm::{TmConfiguration, TmSimulation, TmStep};

/// What every configuration exposes to the shared bucket bookkeeping and to renderers.
pub trait Configuration {
    fn state(&self) -> &State;

    /// Whether this configuration accepts. Fixed when the configuration is built.
    fn accepted(&self) -> bool;

    /// Human readable one-line form, computed on first use.
    fn repr(&self) -> &str;

    /// Newest record of the path that led here, `None` for the seed.
    fn path(&self) -> Option<PathId>;

    /// Number of transitions taken since the seed.
    fn depth(&self) -> usize;
}

/// The three disjoint configuration buckets of a simulation plus a by-state view of the live
/// ones.
#[derive(Debug, Clone)]
pub struct Buckets<C> {
    frontier: Vec<C>,
    accepted: Vec<C>,
    rejected: Vec<C>,
    by_state: HashMap<State, Vec<usize>>,
    steps: usize,
}

impl<C: Configuration> Buckets<C> {
    pub(crate) fn seeded(seed: C) -> Self {
        let mut buckets = Self {
            frontier: Vec::new(),
            accepted: Vec::new(),
            rejected: Vec::new(),
            by_state: HashMap::new(),
            steps: 0,
        };
        buckets.route(seed);
        buckets.reindex();
        buckets
    }

    fn route(&mut self, configuration: C) {
        if configuration.accepted() {
            self.accepted.push(configuration);
        } else {
            self.frontier.push(configuration);
        }
    }

    fn reindex(&mut self) {
        self.by_state.clear();
        for (i, configuration) in self.frontier.iter().enumerate() {
            self.by_state
                .entry(configuration.state().clone())
                .or_default()
                .push(i);
        }
    }

    /// Consumes the frontier, asking `expand` for the successors of each configuration.
    ///
    /// `expand` returns `true` when one of the moves it considered was a dead end on its own;
    /// that configuration is then rejected once, next to whatever successors it did produce. A
    /// configuration for which `expand` produces nothing is rejected as well. Once anything has
    /// been accepted, or once nothing is left alive, the buckets no longer change.
    pub(crate) fn advance<F>(&mut self, mut expand: F) -> Status
    where
        F: FnMut(&C, &mut Vec<C>) -> bool,
    {
        if !self.accepted.is_empty() {
            return Status::Accept;
        }
        if self.frontier.is_empty() {
            return Status::Reject;
        }

        let previous = std::mem::take(&mut self.frontier);
        let mut successors = Vec::new();
        for from in previous {
            let dead_end = expand(&from, &mut successors);
            let stuck = successors.is_empty();
            for next in successors.drain(..) {
                self.route(next);
            }
            if dead_end || stuck {
                self.rejected.push(from);
            }
        }

        self.steps += 1;
        self.reindex();

        debug!(
            step = self.steps,
            frontier = self.frontier.len(),
            accepted = self.accepted.len(),
            rejected = self.rejected.len(),
            "advanced frontier"
        );

        self.status()
    }

    pub fn status(&self) -> Status {
        if !self.accepted.is_empty() {
            Status::Accept
        } else if self.frontier.is_empty() {
            Status::Reject
        } else {
            Status::Pending
        }
    }

    /// Live configurations that the next step will expand.
    pub fn frontier(&self) -> &[C] {
        &self.frontier
    }

    pub fn accepted(&self) -> &[C] {
        &self.accepted
    }

    pub fn rejected(&self) -> &[C] {
        &self.rejected
    }

    /// Live configurations currently sitting in `state`.
    pub fn in_state<'a>(&'a self, state: &str) -> impl Iterator<Item = &'a C> + 'a {
        self.by_state
            .get(state)
            .into_iter()
            .flatten()
            .map(move |&i| &self.frontier[i])
    }

    /// Number of steps that actually advanced the frontier.
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn snapshot_parts(&self) -> (Vec<String>, Vec<String>, Vec<String>, BTreeMap<String, usize>) {
        fn reprs<C: Configuration>(configs: &[C]) -> Vec<String> {
            configs.iter().map(|c| c.repr().to_string()).collect()
        }

        let states = self
            .by_state
            .iter()
            .map(|(state, indices)| (state.to_string(), indices.len()))
            .collect();
        (
            reprs(&self.frontier),
            reprs(&self.accepted),
            reprs(&self.rejected),
            states,
        )
    }
}

/// A serializable view of a simulation for renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub kind: MachineKind,
    pub input: String,
    pub step: usize,
    pub status: Status,
    pub frontier: Vec<String>,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    /// Live configuration count per state.
    pub states: BTreeMap<String, usize>,
    /// For each accepted configuration, the transitions that led to it.
    pub accepted_paths: Vec<Vec<String>>,
}

/// A running simulation of any machine family.
#[derive(Debug, Clone)]
pub enum Simulation {
    Fa(FaSimulation),
    Pda(PdaSimulation),
    Tm(TmSimulation),
}

impl Simulation {
    /// Seeds a simulation of `machine` on `input`.
    pub fn new(machine: &Machine, input: &str) -> Self {
        debug!(kind = %machine.kind(), input, "starting simulation");
        match machine {
            Machine::Fa(fa) => Simulation::Fa(FaSimulation::new(fa.clone(), input)),
            Machine::Pda(pda) => Simulation::Pda(PdaSimulation::new(pda.clone(), input)),
            Machine::Tm(tm) => Simulation::Tm(TmSimulation::new(tm.clone(), input)),
        }
    }

    /// Seeds a simulation from the result of a compile, which may have produced no machine.
    pub fn from_compiled(machine: Option<&Machine>, input: &str) -> Result<Self, AutomataError> {
        machine
            .map(|machine| Self::new(machine, input))
            .ok_or(AutomataError::NoMachine)
    }

    pub fn kind(&self) -> MachineKind {
        match self {
            Simulation::Fa(_) => MachineKind::Fa,
            Simulation::Pda(_) => MachineKind::Pda,
            Simulation::Tm(_) => MachineKind::Tm,
        }
    }

    /// Advances every live branch by one transition.
    pub fn step(&mut self) -> Status {
        match self {
            Simulation::Fa(sim) => sim.step(),
            Simulation::Pda(sim) => sim.step(),
            Simulation::Tm(sim) => sim.step(),
        }
    }

    /// The status `step` last reported, without advancing.
    pub fn status(&self) -> Status {
        match self {
            Simulation::Fa(sim) => sim.status(),
            Simulation::Pda(sim) => sim.status(),
            Simulation::Tm(sim) => sim.status(),
        }
    }

    pub fn step_count(&self) -> usize {
        match self {
            Simulation::Fa(sim) => sim.buckets().steps(),
            Simulation::Pda(sim) => sim.buckets().steps(),
            Simulation::Tm(sim) => sim.buckets().steps(),
        }
    }

    pub fn input(&self) -> String {
        match self {
            Simulation::Fa(sim) => sim.input(),
            Simulation::Pda(sim) => sim.input(),
            Simulation::Tm(sim) => sim.input(),
        }
    }

    /// Steps until the simulation accepts or rejects, or `limit` steps have been taken.
    /// Returns the last status seen, which is `Pending` when the limit ran out.
    pub fn run(&mut self, limit: usize) -> Status {
        let mut status = self.status();
        for _ in 0..limit {
            if status.is_terminal() {
                break;
            }
            status = self.step();
        }
        status
    }

    /// [`Simulation::run`] with the default step limit.
    pub fn run_to_completion(&mut self) -> Status {
        self.run(MAX_EXECUTION_STEPS)
    }

    pub fn snapshot(&self) -> Snapshot {
        let (frontier, accepted, rejected, states, accepted_paths) = match self {
            Simulation::Fa(sim) => parts(sim.buckets(), |c| sim.path_labels(c)),
            Simulation::Pda(sim) => parts(sim.buckets(), |c| sim.path_labels(c)),
            Simulation::Tm(sim) => parts(sim.buckets(), |c| sim.path_labels(c)),
        };

        Snapshot {
            kind: self.kind(),
            input: self.input(),
            step: self.step_count(),
            status: self.status(),
            frontier,
            accepted,
            rejected,
            states,
            accepted_paths,
        }
    }
}

type Parts = (
    Vec<String>,
    Vec<String>,
    Vec<String>,
    BTreeMap<String, usize>,
    Vec<Vec<String>>,
);

fn parts<C: Configuration>(buckets: &Buckets<C>, labels: impl Fn(&C) -> Vec<String>) -> Parts {
    let (frontier, accepted, rejected, states) = buckets.snapshot_parts();
    let accepted_paths = buckets.accepted().iter().map(labels).collect();
    (frontier, accepted, rejected, states, accepted_paths)
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "step {}: {}", self.step, self.status)?;
        for (title, configs) in [
            ("frontier", &self.frontier),
            ("accepted", &self.accepted),
            ("rejected", &self.rejected),
        ] {
            if configs.is_empty() {
                continue;
            }
            writeln!(f, "  {title}:")?;
            for repr in configs {
                writeln!(f, "    {repr}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    const NFA: &str = r#"
type = NFA
Q = {q0, qa, qb, qc}
E = {a, b, c}
F = {qa, qb, qc}
q0 = q0

d(q0, epsilon) = qa
d(q0, epsilon) = qb
d(q0, epsilon) = qc

d(qa, a) = qa
d(qb, b) = qb
d(qc, c) = qc
"#;

    fn machine(src: &str) -> Machine {
        compile(src).machine.expect("source should compile")
    }

    #[test]
    fn test_from_compiled_requires_a_machine() {
        let result = Simulation::from_compiled(None, "ab");
        assert_eq!(result.unwrap_err(), AutomataError::NoMachine);

        let machine = machine(NFA);
        let simulation = Simulation::from_compiled(Some(&machine), "ab").unwrap();
        assert_eq!(simulation.kind(), MachineKind::Fa);
        assert_eq!(simulation.status(), Status::Pending);
    }

    #[test]
    fn test_run_stops_at_terminal_status() {
        let machine = machine(NFA);

        let mut simulation = Simulation::new(&machine, "bbb");
        assert_eq!(simulation.run_to_completion(), Status::Accept);
        assert_eq!(simulation.step_count(), 4);

        let mut simulation = Simulation::new(&machine, "ab");
        assert_eq!(simulation.run_to_completion(), Status::Reject);
    }

    #[test]
    fn test_run_reports_pending_when_limit_runs_out() {
        let machine = machine(NFA);
        let mut simulation = Simulation::new(&machine, "aaaa");

        assert_eq!(simulation.run(2), Status::Pending);
        assert_eq!(simulation.step_count(), 2);
    }

    #[test]
    fn test_snapshot_lists_buckets_and_paths() {
        let machine = machine(NFA);
        let mut simulation = Simulation::new(&machine, "c");
        simulation.step();

        let snapshot = simulation.snapshot();
        assert_eq!(snapshot.step, 1);
        assert_eq!(snapshot.status, Status::Pending);
        assert_eq!(snapshot.frontier, vec!["qa >c", "qb >c", "qc >c"]);
        assert_eq!(snapshot.states.get("qb"), Some(&1));

        simulation.step();
        let snapshot = simulation.snapshot();
        assert_eq!(snapshot.status, Status::Accept);
        assert_eq!(snapshot.accepted, vec!["qc >"]);
        assert_eq!(snapshot.rejected, vec!["qa >c", "qb >c"]);
        assert_eq!(
            snapshot.accepted_paths,
            vec![vec!["q0 -ε-> qc".to_string(), "qc -c-> qc".to_string()]]
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "accept");
        assert_eq!(json["kind"], "fa");
    }
}

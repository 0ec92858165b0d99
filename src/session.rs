//! A host-owned session: the definition being edited, what it compiled to, the current input
//! and the simulation running on it.
//!
//! Anything that invalidates a running simulation (a new source, a new input) drops it; the
//! next [`Session::step`] or an explicit [`Session::reload`] starts a fresh one.

use tracing::debug;

use crate::catalog::Example;
use crate::compiler::compile;
use crate::diagnostics::Diagnostic;
use crate::machine::Machine;
use crate::simulation::Simulation;
use crate::types::{AutomataError, Status};

#[derive(Debug, Default)]
pub struct Session {
    source: String,
    machine: Option<Machine>,
    diagnostics: Vec<Diagnostic>,
    input: String,
    simulation: Option<Simulation>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the source and compiles it. The previous machine is kept only if the new source
    /// compiles; a failed compile leaves the session without a machine.
    pub fn load_source(&mut self, source: impl Into<String>) -> &[Diagnostic] {
        self.source = source.into();
        let compilation = compile(&self.source);
        self.machine = compilation.machine;
        self.diagnostics = compilation.diagnostics;
        self.simulation = None;

        debug!(
            compiled = self.machine.is_some(),
            diagnostics = self.diagnostics.len(),
            "session source replaced"
        );
        &self.diagnostics
    }

    pub fn load_example(&mut self, example: &Example) -> &[Diagnostic] {
        self.load_source(example.source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn machine(&self) -> Option<&Machine> {
        self.machine.as_ref()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Changes the input. A running simulation no longer matches it and is dropped.
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
        self.simulation = None;
    }

    /// Starts a fresh simulation of the current machine on the current input.
    pub fn reload(&mut self) -> Result<&Simulation, AutomataError> {
        let simulation = Simulation::from_compiled(self.machine.as_ref(), &self.input)?;
        Ok(self.simulation.insert(simulation))
    }

    /// Advances the simulation by one step, starting one first if there is none.
    pub fn step(&mut self) -> Result<Status, AutomataError> {
        if self.simulation.is_none() {
            self.reload()?;
        }

        match self.simulation.as_mut() {
            Some(simulation) => Ok(simulation.step()),
            None => Err(AutomataError::NoMachine),
        }
    }

    /// Drops the running simulation, keeping the machine and input.
    pub fn clear(&mut self) {
        self.simulation = None;
    }

    /// Status of the running simulation, if any.
    pub fn status(&self) -> Option<Status> {
        self.simulation.as_ref().map(Simulation::status)
    }

    pub fn simulation(&self) -> Option<&Simulation> {
        self.simulation.as_ref()
    }
}

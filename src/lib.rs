//! This crate provides the core logic for a step-by-step simulator of finite automata,
//! pushdown automata and Turing machines, all of which may be nondeterministic.
//! It includes modules for compiling machine definitions, simulating them one step at a time,
//! analyzing definitions for likely mistakes, and managing a catalog of example machines.

pub mod analyzer;
pub mod catalog;
pub mod compiler;
pub mod diagnostics;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod session;
pub mod simulation;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the `analyze` function and `AnalysisWarning` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisWarning};
/// Re-exports the example catalog.
pub use catalog::{Example, ExampleCatalog, ExampleInfo, EXAMPLES};
/// Re-exports the compiler entry point and its result.
pub use compiler::{compile, Compilation, MachineType};
/// Re-exports compiler diagnostics.
pub use diagnostics::{Diagnostic, Level};
/// Re-exports the `MachineLoader` struct from the loader module.
pub use loader::MachineLoader;
/// Re-exports the compiled machine types.
pub use machine::{Fa, Machine, MachineDefinition, MachineKind, Pda, PdaAcceptance, Tm};
/// Re-exports the host-owned `Session`.
pub use session::Session;
/// Re-exports the simulation engines and their views.
pub use simulation::{Simulation, Snapshot};
/// Re-exports the shared names, constants and the crate-wide error type.
pub use types::{
    AutomataError, Direction, Letter, Span, State, Status, Symbol, MAX_EXECUTION_STEPS,
    MAX_SOURCE_SIZE,
};

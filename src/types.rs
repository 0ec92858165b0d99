//! This module defines the core data structures and types shared across the crate: interned
//! names for states, symbols and letters, source spans, head directions, simulation status
//! and the crate-wide error type.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::Rule;

/// Initial state assumed when a definition does not name one explicitly.
pub const DEFAULT_INITIAL_STATE: &str = "q0";
/// Bottom-of-stack marker assumed when a PDA definition does not name one explicitly.
pub const DEFAULT_INITIAL_STACK: &str = "z0";
/// Blank symbol assumed when a TM definition does not name one explicitly.
pub const DEFAULT_BLANK_SYMBOL: &str = "B";
/// How an epsilon move is displayed in paths and transition labels.
pub const EPSILON_DISPLAY: &str = "ε";
/// The maximum allowed size for a machine definition in bytes.
pub const MAX_SOURCE_SIZE: usize = 65536; // 64KB
/// The maximum number of steps `Simulation::run` performs before giving up.
pub const MAX_EXECUTION_STEPS: usize = 10000;

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(name: impl Into<Arc<str>>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), &*self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self::new(name)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_type! {
    /// Name of an automaton state.
    State
}

name_type! {
    /// A stack (PDA) or tape (TM) alphabet symbol.
    Symbol
}

name_type! {
    /// A single input alphabet letter.
    Letter
}

/// Byte range into a machine's source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        Span::new(span.start(), span.end())
    }
}

/// Represents the possible directions a Turing Machine head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one position to the left.
    Left,
    /// Move the head one position to the right.
    Right,
    /// Keep the head in the same position.
    Stay,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Left => "L",
            Direction::Right => "R",
            Direction::Stay => "S",
        })
    }
}

/// Aggregate outcome of a simulation after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Live branches remain and none has accepted yet.
    Pending,
    /// At least one branch reached an accepting configuration.
    Accept,
    /// Every branch died without accepting.
    Reject,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pending => "pending",
            Status::Accept => "accept",
            Status::Reject => "reject",
        })
    }
}

/// Represents the errors that can occur while loading, compiling or simulating machines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutomataError {
    /// Syntax error in a machine definition.
    #[error("Definition parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// The definition parsed but failed to compile; carries every diagnostic produced.
    #[error("Compilation failed: {}", summarize(.0))]
    CompileError(Vec<Diagnostic>),
    /// A serialized machine definition is internally inconsistent.
    #[error("Invalid machine definition: {0}")]
    InvalidDefinition(String),
    /// A simulation was requested but there is no compiled machine.
    #[error("No machine to simulate")]
    NoMachine,
    /// Input rejected before reaching the compiler (size limits and the like).
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Reading machine files or directories failed.
    #[error("File error: {0}")]
    FileError(String),
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    let mut errors = diagnostics.iter().filter(|d| d.is_error());
    match (errors.next(), errors.count()) {
        (Some(first), 0) => first.message.clone(),
        (Some(first), rest) => format!("{} (and {rest} more)", first.message),
        (None, _) => "no errors reported".to_string(),
    }
}

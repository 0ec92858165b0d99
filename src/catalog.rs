//! Embedded example machines, grouped by category, that hosts can offer as starting points.

use serde::Serialize;

use crate::compiler::{compile, Compilation};
use crate::machine::{Machine, MachineKind};
use crate::types::AutomataError;

// (category, title, source)
const EXAMPLE_SOURCES: [(&str, &str, &str); 12] = [
    (
        "Tutorial",
        "DFA",
        include_str!("../machines/dfa_different_ends.auto"),
    ),
    (
        "Tutorial",
        "NFA",
        include_str!("../machines/nfa_divisible.auto"),
    ),
    (
        "Tutorial",
        "NFA with epsilon",
        include_str!("../machines/nfa_epsilon.auto"),
    ),
    (
        "Tutorial",
        "DPDA Final State",
        include_str!("../machines/dpda_unequal.auto"),
    ),
    (
        "Tutorial",
        "DPDA Empty Stack",
        include_str!("../machines/dpda_anbn.auto"),
    ),
    (
        "Tutorial",
        "NPDA Empty Stack",
        include_str!("../machines/npda_palindrome.auto"),
    ),
    ("Tutorial", "TM", include_str!("../machines/tm_anbncn.auto")),
    ("DFA", "modulo", include_str!("../machines/dfa_modulo.auto")),
    ("DPDA", "unequal", include_str!("../machines/dpda_unequal.auto")),
    (
        "NPDA",
        "palindrome",
        include_str!("../machines/npda_palindrome.auto"),
    ),
    (
        "NPDA",
        "kleen star stack",
        include_str!("../machines/npda_kleene_star.auto"),
    ),
    ("TM", "a^nb^n", include_str!("../machines/tm_anbn.auto")),
];

/// One embedded example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub category: &'static str,
    pub title: &'static str,
    pub source: &'static str,
}

impl Example {
    /// Compiles the example's source, diagnostics included.
    pub fn compile(&self) -> Compilation {
        compile(self.source)
    }

    pub fn machine(&self) -> Result<Machine, AutomataError> {
        self.compile().into_result()
    }
}

lazy_static::lazy_static! {
    pub static ref EXAMPLES: Vec<Example> = EXAMPLE_SOURCES
        .iter()
        .map(|&(category, title, source)| Example { category, title, source })
        .collect();
}

/// Summary of an example, suitable for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleInfo {
    pub index: usize,
    pub category: String,
    pub title: String,
    pub kind: MachineKind,
    pub state_count: usize,
    pub transition_count: usize,
}

pub struct ExampleCatalog;

impl ExampleCatalog {
    /// Get the number of available examples
    pub fn count() -> usize {
        EXAMPLES.len()
    }

    /// Get an example by its index
    pub fn by_index(index: usize) -> Result<&'static Example, AutomataError> {
        EXAMPLES.get(index).ok_or_else(|| {
            AutomataError::ValidationError(format!("Example index {} out of range", index))
        })
    }

    /// Get an example by its title, ignoring case. A `category/title` form picks between
    /// examples that share a title.
    pub fn by_title(title: &str) -> Result<&'static Example, AutomataError> {
        let wanted = title.trim().to_lowercase();
        EXAMPLES
            .iter()
            .find(|example| {
                example.title.to_lowercase() == wanted
                    || format!("{}/{}", example.category, example.title).to_lowercase() == wanted
            })
            .ok_or_else(|| AutomataError::ValidationError(format!("Example '{}' not found", title)))
    }

    /// List all example titles, in catalog order
    pub fn titles() -> Vec<&'static str> {
        EXAMPLES.iter().map(|example| example.title).collect()
    }

    /// Indices of the examples whose title or category contains `query`, ignoring case.
    pub fn search(query: &str) -> Vec<usize> {
        let query = query.to_lowercase();
        EXAMPLES
            .iter()
            .enumerate()
            .filter(|(_, example)| {
                example.title.to_lowercase().contains(&query)
                    || example.category.to_lowercase().contains(&query)
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Compiles the example at `index` and describes the resulting machine.
    pub fn info(index: usize) -> Result<ExampleInfo, AutomataError> {
        let example = Self::by_index(index)?;
        let machine = example.machine()?;

        Ok(ExampleInfo {
            index,
            category: example.category.to_string(),
            title: example.title.to_string(),
            kind: machine.kind(),
            state_count: machine.states().len(),
            transition_count: machine.transition_count(),
        })
    }

    /// Compiles the example at `index`.
    pub fn compile(index: usize) -> Result<Compilation, AutomataError> {
        Ok(Self::by_index(index)?.compile())
    }
}

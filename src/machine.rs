//! The machine model: serializable definitions for finite automata, pushdown automata and
//! Turing machines, and the immutable `Machine` built from them together with its transition
//! index.
//!
//! A definition carries the raw transition table as an ordered list of
//! `(source, [target, ...])` pairs. Building a machine validates the definition and derives a
//! nested lookup index from that table in a single pass. The index is never touched again, so
//! a `Machine` can be shared by reference between any number of simulations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::types::{AutomataError, Direction, Letter, Span, State, Symbol, EPSILON_DISPLAY};

/// Successor lists keyed by an input letter, with epsilon moves kept apart from every literal
/// letter so both can be explored for the same source.
#[derive(Debug, Clone)]
pub struct LetterMap<T> {
    epsilon: Vec<T>,
    letters: HashMap<Letter, Vec<T>>,
}

impl<T> Default for LetterMap<T> {
    fn default() -> Self {
        Self {
            epsilon: Vec::new(),
            letters: HashMap::new(),
        }
    }
}

impl<T> LetterMap<T> {
    fn push(&mut self, letter: Option<&Letter>, target: T) {
        match letter {
            Some(letter) => self.letters.entry(letter.clone()).or_default().push(target),
            None => self.epsilon.push(target),
        }
    }

    /// Targets reachable without consuming input.
    pub fn epsilon(&self) -> &[T] {
        &self.epsilon
    }

    /// Targets reachable by consuming `letter`, together with the interned key.
    pub fn letter_entry(&self, letter: &str) -> Option<(&Letter, &[T])> {
        self.letters
            .get_key_value(letter)
            .map(|(key, targets)| (key, targets.as_slice()))
    }
}

// ---------------------------------------------------------------------------
// Finite automata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaSource {
    pub state: State,
    /// `None` is an epsilon move.
    pub letter: Option<Letter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaTarget {
    pub state: State,
    /// Span of the whole `d(...)` function in the source.
    #[serde(default)]
    pub function: Span,
    /// Span of this particular target in the source.
    #[serde(default)]
    pub transition: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaDefinition {
    pub initial_state: State,
    pub states: BTreeSet<State>,
    pub alphabet: BTreeSet<Letter>,
    pub final_states: BTreeSet<State>,
    pub transitions: Vec<(FaSource, Vec<FaTarget>)>,
}

/// A finite automaton, deterministic or not.
#[derive(Debug, Clone)]
pub struct Fa {
    definition: FaDefinition,
    index: HashMap<State, LetterMap<FaTarget>>,
}

impl Fa {
    pub fn new(definition: FaDefinition) -> Result<Self, AutomataError> {
        let d = &definition;
        require(&d.states, &d.initial_state, "initial state")?;
        require_all(&d.states, &d.final_states, "final state")?;
        check_alphabet(&d.alphabet)?;

        let mut index: HashMap<State, LetterMap<FaTarget>> = HashMap::new();
        for (from, targets) in &d.transitions {
            require(&d.states, &from.state, "transition state")?;
            if let Some(letter) = &from.letter {
                require(&d.alphabet, letter, "transition letter")?;
            }
            let entry = index.entry(from.state.clone()).or_default();
            for to in targets {
                require(&d.states, &to.state, "transition state")?;
                entry.push(from.letter.as_ref(), to.clone());
            }
        }

        Ok(Self { definition, index })
    }

    pub fn definition(&self) -> &FaDefinition {
        &self.definition
    }

    pub fn initial_state(&self) -> &State {
        &self.definition.initial_state
    }

    pub fn is_final(&self, state: &State) -> bool {
        self.definition.final_states.contains(state)
    }

    pub fn successors(&self, state: &State) -> Option<&LetterMap<FaTarget>> {
        self.index.get(state)
    }
}

// ---------------------------------------------------------------------------
// Pushdown automata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PdaSource {
    pub state: State,
    /// `None` is an epsilon move.
    pub letter: Option<Letter>,
    /// Symbol that must be on top of the stack; it is popped by the move.
    pub symbol: Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PdaTarget {
    pub state: State,
    /// Replacement for the popped symbol, bottom first: the last element becomes the new top.
    /// Empty means pop without push.
    pub push: Vec<Symbol>,
    #[serde(default)]
    pub function: Span,
    #[serde(default)]
    pub transition: Span,
}

/// How a pushdown automaton decides acceptance once its input is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum PdaAcceptance {
    /// Accept in any of the listed states.
    FinalState { states: BTreeSet<State> },
    /// Accept when only the initial stack marker is left on the stack.
    EmptyStack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdaDefinition {
    pub initial_state: State,
    pub initial_stack: Symbol,
    pub states: BTreeSet<State>,
    pub alphabet: BTreeSet<Letter>,
    pub symbols: BTreeSet<Symbol>,
    pub acceptance: PdaAcceptance,
    pub transitions: Vec<(PdaSource, Vec<PdaTarget>)>,
}

type PdaIndex = HashMap<State, HashMap<Symbol, LetterMap<PdaTarget>>>;

/// A pushdown automaton, deterministic or not.
#[derive(Debug, Clone)]
pub struct Pda {
    definition: PdaDefinition,
    index: PdaIndex,
}

impl Pda {
    pub fn new(definition: PdaDefinition) -> Result<Self, AutomataError> {
        let d = &definition;
        require(&d.states, &d.initial_state, "initial state")?;
        require(&d.symbols, &d.initial_stack, "initial stack symbol")?;
        check_alphabet(&d.alphabet)?;
        if let PdaAcceptance::FinalState { states } = &d.acceptance {
            require_all(&d.states, states, "final state")?;
        }

        let mut index: PdaIndex = HashMap::new();
        for (from, targets) in &d.transitions {
            require(&d.states, &from.state, "transition state")?;
            require(&d.symbols, &from.symbol, "transition stack symbol")?;
            if let Some(letter) = &from.letter {
                require(&d.alphabet, letter, "transition letter")?;
            }
            let entry = index
                .entry(from.state.clone())
                .or_default()
                .entry(from.symbol.clone())
                .or_default();
            for to in targets {
                require(&d.states, &to.state, "transition state")?;
                for symbol in &to.push {
                    require(&d.symbols, symbol, "pushed stack symbol")?;
                }
                entry.push(from.letter.as_ref(), to.clone());
            }
        }

        Ok(Self { definition, index })
    }

    pub fn definition(&self) -> &PdaDefinition {
        &self.definition
    }

    pub fn initial_state(&self) -> &State {
        &self.definition.initial_state
    }

    pub fn initial_stack(&self) -> &Symbol {
        &self.definition.initial_stack
    }

    pub fn acceptance(&self) -> &PdaAcceptance {
        &self.definition.acceptance
    }

    pub fn successors(&self, state: &State, top: &Symbol) -> Option<&LetterMap<PdaTarget>> {
        self.index.get(state)?.get(top)
    }
}

// ---------------------------------------------------------------------------
// Turing machines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TmSource {
    pub state: State,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TmTarget {
    pub state: State,
    pub write: Symbol,
    pub direction: Direction,
    #[serde(default)]
    pub function: Span,
    #[serde(default)]
    pub transition: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmDefinition {
    pub initial_state: State,
    pub blank: Symbol,
    pub states: BTreeSet<State>,
    /// Input letters. May be empty, in which case any input is written to the tape as is.
    #[serde(default)]
    pub alphabet: BTreeSet<Letter>,
    pub symbols: BTreeSet<Symbol>,
    pub final_states: BTreeSet<State>,
    pub transitions: Vec<(TmSource, Vec<TmTarget>)>,
}

/// A single tape Turing machine, deterministic or not.
#[derive(Debug, Clone)]
pub struct Tm {
    definition: TmDefinition,
    index: HashMap<State, HashMap<Symbol, Vec<TmTarget>>>,
}

impl Tm {
    pub fn new(definition: TmDefinition) -> Result<Self, AutomataError> {
        let d = &definition;
        require(&d.states, &d.initial_state, "initial state")?;
        require(&d.symbols, &d.blank, "blank symbol")?;
        require_all(&d.states, &d.final_states, "final state")?;
        check_alphabet(&d.alphabet)?;
        for letter in &d.alphabet {
            if !d.symbols.contains(letter.as_str()) {
                return Err(AutomataError::InvalidDefinition(format!(
                    "input letter '{letter}' is not a tape symbol"
                )));
            }
        }

        let mut index: HashMap<State, HashMap<Symbol, Vec<TmTarget>>> = HashMap::new();
        for (from, targets) in &d.transitions {
            require(&d.states, &from.state, "transition state")?;
            require(&d.symbols, &from.symbol, "transition tape symbol")?;
            let entry = index
                .entry(from.state.clone())
                .or_default()
                .entry(from.symbol.clone())
                .or_default();
            for to in targets {
                require(&d.states, &to.state, "transition state")?;
                require(&d.symbols, &to.write, "written tape symbol")?;
                entry.push(to.clone());
            }
        }

        Ok(Self { definition, index })
    }

    pub fn definition(&self) -> &TmDefinition {
        &self.definition
    }

    pub fn initial_state(&self) -> &State {
        &self.definition.initial_state
    }

    pub fn blank(&self) -> &Symbol {
        &self.definition.blank
    }

    pub fn is_final(&self, state: &State) -> bool {
        self.definition.final_states.contains(state)
    }

    pub fn successors(&self, state: &State, symbol: &Symbol) -> &[TmTarget] {
        self.index
            .get(state)
            .and_then(|symbols| symbols.get(symbol))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Which family a machine belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Fa,
    Pda,
    Tm,
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MachineKind::Fa => "fa",
            MachineKind::Pda => "pda",
            MachineKind::Tm => "tm",
        })
    }
}

/// Serialized form of a machine: a kind tag plus the flat definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MachineDefinition {
    Fa(FaDefinition),
    Pda(PdaDefinition),
    Tm(TmDefinition),
}

/// A compiled, immutable machine. Cloning only bumps a reference count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MachineDefinition", into = "MachineDefinition")]
pub enum Machine {
    Fa(Arc<Fa>),
    Pda(Arc<Pda>),
    Tm(Arc<Tm>),
}

/// A labelled edge between two states, one per transition target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: State,
    pub to: State,
    pub label: String,
    pub function: Span,
    pub transition: Span,
}

impl Machine {
    pub fn kind(&self) -> MachineKind {
        match self {
            Machine::Fa(_) => MachineKind::Fa,
            Machine::Pda(_) => MachineKind::Pda,
            Machine::Tm(_) => MachineKind::Tm,
        }
    }

    pub fn initial_state(&self) -> &State {
        match self {
            Machine::Fa(fa) => fa.initial_state(),
            Machine::Pda(pda) => pda.initial_state(),
            Machine::Tm(tm) => tm.initial_state(),
        }
    }

    pub fn states(&self) -> &BTreeSet<State> {
        match self {
            Machine::Fa(fa) => &fa.definition.states,
            Machine::Pda(pda) => &pda.definition.states,
            Machine::Tm(tm) => &tm.definition.states,
        }
    }

    /// Final states, or `None` for a PDA accepting by empty stack.
    pub fn final_states(&self) -> Option<&BTreeSet<State>> {
        match self {
            Machine::Fa(fa) => Some(&fa.definition.final_states),
            Machine::Pda(pda) => match &pda.definition.acceptance {
                PdaAcceptance::FinalState { states } => Some(states),
                PdaAcceptance::EmptyStack => None,
            },
            Machine::Tm(tm) => Some(&tm.definition.final_states),
        }
    }

    pub fn definition(&self) -> MachineDefinition {
        match self {
            Machine::Fa(fa) => MachineDefinition::Fa(fa.definition.clone()),
            Machine::Pda(pda) => MachineDefinition::Pda(pda.definition.clone()),
            Machine::Tm(tm) => MachineDefinition::Tm(tm.definition.clone()),
        }
    }

    /// Every transition target as a labelled edge, in definition order.
    pub fn edges(&self) -> Vec<Edge> {
        fn edge(from: &State, to: &State, label: String, function: Span, transition: Span) -> Edge {
            Edge {
                from: from.clone(),
                to: to.clone(),
                label,
                function,
                transition,
            }
        }

        match self {
            Machine::Fa(fa) => fa
                .definition
                .transitions
                .iter()
                .flat_map(|(from, targets)| {
                    targets.iter().map(move |to| {
                        let label = letter_label(from.letter.as_ref());
                        edge(&from.state, &to.state, label, to.function, to.transition)
                    })
                })
                .collect(),
            Machine::Pda(pda) => pda
                .definition
                .transitions
                .iter()
                .flat_map(|(from, targets)| {
                    targets.iter().map(move |to| {
                        let push = to
                            .push
                            .iter()
                            .rev()
                            .map(Symbol::as_str)
                            .collect::<Vec<_>>()
                            .join(" ");
                        let label = format!(
                            "{},{}->[{}]",
                            letter_label(from.letter.as_ref()),
                            from.symbol,
                            push
                        );
                        edge(&from.state, &to.state, label, to.function, to.transition)
                    })
                })
                .collect(),
            Machine::Tm(tm) => tm
                .definition
                .transitions
                .iter()
                .flat_map(|(from, targets)| {
                    targets.iter().map(move |to| {
                        let label = format!("{}->{},{}", from.symbol, to.write, to.direction);
                        edge(&from.state, &to.state, label, to.function, to.transition)
                    })
                })
                .collect(),
        }
    }

    pub fn transition_count(&self) -> usize {
        match self {
            Machine::Fa(fa) => fa.definition.transitions.iter().map(|(_, t)| t.len()).sum(),
            Machine::Pda(pda) => pda.definition.transitions.iter().map(|(_, t)| t.len()).sum(),
            Machine::Tm(tm) => tm.definition.transitions.iter().map(|(_, t)| t.len()).sum(),
        }
    }
}

impl TryFrom<MachineDefinition> for Machine {
    type Error = AutomataError;

    fn try_from(definition: MachineDefinition) -> Result<Self, Self::Error> {
        Ok(match definition {
            MachineDefinition::Fa(d) => Machine::Fa(Arc::new(Fa::new(d)?)),
            MachineDefinition::Pda(d) => Machine::Pda(Arc::new(Pda::new(d)?)),
            MachineDefinition::Tm(d) => Machine::Tm(Arc::new(Tm::new(d)?)),
        })
    }
}

impl From<Machine> for MachineDefinition {
    fn from(machine: Machine) -> Self {
        machine.definition()
    }
}

fn letter_label(letter: Option<&Letter>) -> String {
    letter.map_or_else(|| EPSILON_DISPLAY.to_string(), |l| l.to_string())
}

fn require<T: Ord + fmt::Display>(
    declared: &BTreeSet<T>,
    item: &T,
    what: &str,
) -> Result<(), AutomataError> {
    if declared.contains(item) {
        Ok(())
    } else {
        Err(AutomataError::InvalidDefinition(format!(
            "{what} '{item}' is not declared"
        )))
    }
}

fn require_all<T: Ord + fmt::Display>(
    declared: &BTreeSet<T>,
    items: &BTreeSet<T>,
    what: &str,
) -> Result<(), AutomataError> {
    items.iter().try_for_each(|item| require(declared, item, what))
}

fn check_alphabet(alphabet: &BTreeSet<Letter>) -> Result<(), AutomataError> {
    match alphabet.iter().find(|l| l.as_str().chars().count() != 1) {
        Some(letter) => Err(AutomataError::InvalidDefinition(format!(
            "letter '{letter}' must be exactly one character"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set<T: From<&'static str> + Ord>(items: &[&'static str]) -> BTreeSet<T> {
        items.iter().map(|&s| T::from(s)).collect()
    }

    fn fa_target(state: &str) -> FaTarget {
        FaTarget {
            state: state.into(),
            function: Span::default(),
            transition: Span::default(),
        }
    }

    fn nfa_definition() -> FaDefinition {
        FaDefinition {
            initial_state: "q0".into(),
            states: set(&["q0", "qa", "qb"]),
            alphabet: set(&["a", "b"]),
            final_states: set(&["qa"]),
            transitions: vec![
                (
                    FaSource {
                        state: "q0".into(),
                        letter: None,
                    },
                    vec![fa_target("qa"), fa_target("qb")],
                ),
                (
                    FaSource {
                        state: "q0".into(),
                        letter: Some("a".into()),
                    },
                    vec![fa_target("qa")],
                ),
                (
                    FaSource {
                        state: "q0".into(),
                        letter: Some("a".into()),
                    },
                    vec![fa_target("qa")],
                ),
            ],
        }
    }

    #[test]
    fn test_fa_index_separates_epsilon_and_keeps_duplicates() {
        let fa = Fa::new(nfa_definition()).unwrap();
        let successors = fa.successors(&"q0".into()).unwrap();

        let epsilon: Vec<_> = successors.epsilon().iter().map(|t| t.state.as_str()).collect();
        assert_eq!(epsilon, vec!["qa", "qb"]);
        assert_eq!(successors.letter_entry("a").map(|(_, t)| t.len()), Some(2));
        assert!(successors.letter_entry("b").is_none());
        assert!(fa.successors(&"qb".into()).is_none());
    }

    #[test]
    fn test_fa_rejects_undeclared_initial_state() {
        let mut definition = nfa_definition();
        definition.initial_state = "q9".into();

        let error = Fa::new(definition).unwrap_err();
        assert_eq!(
            error,
            AutomataError::InvalidDefinition("initial state 'q9' is not declared".into())
        );
    }

    #[test]
    fn test_fa_rejects_long_letters() {
        let mut definition = nfa_definition();
        definition.alphabet.insert("ab".into());

        assert!(matches!(
            Fa::new(definition),
            Err(AutomataError::InvalidDefinition(msg)) if msg.contains("exactly one character")
        ));
    }

    #[test]
    fn test_pda_index_is_keyed_by_stack_top() {
        let pda = Pda::new(PdaDefinition {
            initial_state: "q".into(),
            initial_stack: "Z".into(),
            states: set(&["q"]),
            alphabet: set(&["a"]),
            symbols: set(&["Z", "A"]),
            acceptance: PdaAcceptance::EmptyStack,
            transitions: vec![(
                PdaSource {
                    state: "q".into(),
                    letter: Some("a".into()),
                    symbol: "Z".into(),
                },
                vec![PdaTarget {
                    state: "q".into(),
                    push: vec!["Z".into(), "A".into()],
                    function: Span::default(),
                    transition: Span::default(),
                }],
            )],
        })
        .unwrap();

        let q = State::from("q");
        let on_z = pda.successors(&q, &"Z".into()).unwrap();
        assert_eq!(on_z.letter_entry("a").map(|(_, t)| t.len()), Some(1));
        assert!(pda.successors(&q, &"A".into()).is_none());
    }

    #[test]
    fn test_tm_rejects_undeclared_written_symbol() {
        let result = Tm::new(TmDefinition {
            initial_state: "q0".into(),
            blank: "B".into(),
            states: set(&["q0"]),
            alphabet: BTreeSet::new(),
            symbols: set(&["a", "B"]),
            final_states: BTreeSet::new(),
            transitions: vec![(
                TmSource {
                    state: "q0".into(),
                    symbol: "a".into(),
                },
                vec![TmTarget {
                    state: "q0".into(),
                    write: "x".into(),
                    direction: Direction::Right,
                    function: Span::default(),
                    transition: Span::default(),
                }],
            )],
        });

        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid machine definition: written tape symbol 'x' is not declared"
        );
    }

    #[test]
    fn test_machine_serializes_through_definition() {
        let machine = Machine::try_from(MachineDefinition::Fa(nfa_definition())).unwrap();
        let json = serde_json::to_value(&machine).unwrap();

        assert_eq!(json["type"], "fa");
        assert_eq!(json["transitions"][0][0]["letter"], serde_json::Value::Null);
        assert_eq!(json["transitions"][0][1][1]["state"], "qb");

        let back: Machine = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), MachineKind::Fa);
        assert_eq!(back.definition(), machine.definition());
    }

    #[test]
    fn test_deserializing_invalid_definition_fails() {
        let json = r#"{
            "type": "fa",
            "initial_state": "q0",
            "states": ["q0"],
            "alphabet": ["a"],
            "final_states": ["q1"],
            "transitions": []
        }"#;

        let error = serde_json::from_str::<Machine>(json).unwrap_err();
        assert!(error.to_string().contains("final state 'q1' is not declared"));
    }

    #[test]
    fn test_edges_labels() {
        let machine = Machine::try_from(MachineDefinition::Fa(nfa_definition())).unwrap();
        let labels: Vec<_> = machine.edges().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["ε", "ε", "a", "a"]);
        assert_eq!(machine.transition_count(), 4);
    }
}

//! Compiles machine definitions into [`Machine`]s.
//!
//! Compilation never stops at the first problem: every statement is checked and every issue is
//! reported as a [`Diagnostic`] pointing into the source. A machine is only produced when no
//! error was reported. Successfully compiled machines are also run through the analyzer, whose
//! warnings are appended to the diagnostics.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, info};

use crate::analyzer::analyze;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::machine::{
    Fa, FaDefinition, FaSource, FaTarget, Machine, MachineKind, Pda, PdaAcceptance,
    PdaDefinition, PdaSource, PdaTarget, Tm, TmDefinition, TmSource, TmTarget,
};
use crate::parser::{self, Item, Spanned, Statement};
use crate::types::{
    AutomataError, Direction, Letter, Span, State, Symbol, DEFAULT_BLANK_SYMBOL,
    DEFAULT_INITIAL_STACK, DEFAULT_INITIAL_STATE, MAX_SOURCE_SIZE,
};

/// Outcome of compiling a definition: the machine, if there were no errors, and everything the
/// compiler had to say.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub machine: Option<Machine>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// All diagnostics rendered against `src`, one block per diagnostic.
    pub fn render(&self, src: &str) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.render(src))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn into_result(self) -> Result<Machine, AutomataError> {
        match self.machine {
            Some(machine) => Ok(machine),
            None => Err(AutomataError::CompileError(self.diagnostics)),
        }
    }
}

/// The `type = ...` a definition starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
    Dfa,
    Nfa,
    Dpda,
    Npda,
    Tm,
    Ntm,
}

impl MachineType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "dfa" => MachineType::Dfa,
            "nfa" => MachineType::Nfa,
            "dpda" => MachineType::Dpda,
            "npda" => MachineType::Npda,
            "tm" => MachineType::Tm,
            "ntm" => MachineType::Ntm,
            _ => return None,
        })
    }

    pub fn kind(self) -> MachineKind {
        match self {
            MachineType::Dfa | MachineType::Nfa => MachineKind::Fa,
            MachineType::Dpda | MachineType::Npda => MachineKind::Pda,
            MachineType::Tm | MachineType::Ntm => MachineKind::Tm,
        }
    }

    pub fn is_deterministic(self) -> bool {
        matches!(self, MachineType::Dfa | MachineType::Dpda | MachineType::Tm)
    }

    fn name(self) -> &'static str {
        match self {
            MachineType::Dfa => "DFA",
            MachineType::Nfa => "NFA",
            MachineType::Dpda => "DPDA",
            MachineType::Npda => "NPDA",
            MachineType::Tm => "TM",
            MachineType::Ntm => "NTM",
        }
    }
}

/// Compiles `src` into a machine.
pub fn compile(src: &str) -> Compilation {
    let mut diagnostics = Diagnostics::new();
    let machine = compile_machine(src, &mut diagnostics);

    if let Some(machine) = &machine {
        diagnostics.extend(analyze(machine));
    }

    info!(
        kind = ?machine.as_ref().map(Machine::kind),
        diagnostics = diagnostics.entries().len(),
        errors = diagnostics.has_errors(),
        "compiled machine definition"
    );

    Compilation {
        machine,
        diagnostics: diagnostics.into_entries(),
    }
}

fn compile_machine(src: &str, diagnostics: &mut Diagnostics) -> Option<Machine> {
    if src.len() > MAX_SOURCE_SIZE {
        diagnostics.error_locless(format!(
            "definition is too large ({} bytes, maximum is {MAX_SOURCE_SIZE})",
            src.len()
        ));
        return None;
    }

    let statements = match parser::parse(src) {
        Ok(statements) => statements,
        Err(AutomataError::ParseError(error)) => {
            diagnostics.error(parser::error_message(&error), parser::error_span(&error));
            return None;
        }
        Err(error) => {
            diagnostics.error_locless(error.to_string());
            return None;
        }
    };

    let eof = Span::new(src.len(), src.len());
    let mut statements = statements.iter();
    let machine_type = machine_type(statements.next(), eof, diagnostics)?;
    debug!(machine_type = machine_type.name(), "compiling");

    let declarations = Declarations::collect(statements, machine_type, diagnostics);
    let built = match machine_type.kind() {
        MachineKind::Fa => build_fa(&declarations, machine_type, diagnostics)
            .map(|d| Fa::new(d).map(|fa| Machine::Fa(Arc::new(fa)))),
        MachineKind::Pda => build_pda(&declarations, machine_type, diagnostics)
            .map(|d| Pda::new(d).map(|pda| Machine::Pda(Arc::new(pda)))),
        MachineKind::Tm => build_tm(&declarations, machine_type, diagnostics)
            .map(|d| Tm::new(d).map(|tm| Machine::Tm(Arc::new(tm)))),
    };

    if diagnostics.has_errors() {
        return None;
    }

    match built? {
        Ok(machine) => Some(machine),
        Err(error) => {
            diagnostics.error_locless(error.to_string());
            None
        }
    }
}

fn machine_type(
    first: Option<&Spanned<Statement>>,
    eof: Span,
    diagnostics: &mut Diagnostics,
) -> Option<MachineType> {
    let value = match first.map(|s| &s.node) {
        Some(Statement::Assignment { name, value }) if name.node == "type" => value,
        _ => {
            let span = first.map_or(eof, |s| s.span);
            diagnostics
                .error("expected type=<type> as first item", span)
                .help("add: type = ...");
            return None;
        }
    };

    let parsed = match &value.node {
        Item::Ident(name) => MachineType::parse(name),
        _ => None,
    };
    if parsed.is_none() {
        diagnostics.error(
            "unknown type, expected 'DFA' | 'NFA' | 'DPDA' | 'NPDA' | 'TM' | 'NTM'",
            value.span,
        );
    }
    parsed
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    States,
    Alphabet,
    Symbols,
    FinalStates,
    InitialState,
    InitialStack,
    Blank,
    Accept,
}

impl Key {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "Q" => Key::States,
            "E" | "sigma" | "Σ" => Key::Alphabet,
            "T" | "G" | "gamma" | "Γ" => Key::Symbols,
            "F" => Key::FinalStates,
            "q0" | "I" => Key::InitialState,
            "z0" | "S" => Key::InitialStack,
            "B" | "blank" => Key::Blank,
            "accept" => Key::Accept,
            _ => return None,
        })
    }

    fn allowed(self, kind: MachineKind) -> bool {
        match self {
            Key::States | Key::Alphabet | Key::FinalStates | Key::InitialState => true,
            Key::Symbols => kind != MachineKind::Fa,
            Key::InitialStack | Key::Accept => kind == MachineKind::Pda,
            Key::Blank => kind == MachineKind::Tm,
        }
    }

    fn what(self) -> &'static str {
        match self {
            Key::States => "states",
            Key::Alphabet => "alphabet",
            Key::Symbols => "symbols",
            Key::FinalStates => "final states",
            Key::InitialState => "initial state",
            Key::InitialStack => "initial stack symbol",
            Key::Blank => "blank symbol",
            Key::Accept => "acceptance mode",
        }
    }

    fn singular(self) -> &'static str {
        match self {
            Key::States => "state",
            Key::Alphabet => "letter",
            Key::Symbols => "symbol",
            Key::FinalStates => "final state",
            other => other.what(),
        }
    }

    fn expected(kind: MachineKind) -> &'static str {
        match kind {
            MachineKind::Fa => "'Q' | 'E' | 'sigma' | 'Σ' | 'F' | 'q0' | 'I'",
            MachineKind::Pda => {
                "'Q' | 'E' | 'sigma' | 'Σ' | 'T' | 'G' | 'gamma' | 'Γ' | 'F' | 'q0' | 'I' | 'z0' | 'S' | 'accept'"
            }
            MachineKind::Tm => {
                "'Q' | 'E' | 'sigma' | 'Σ' | 'T' | 'G' | 'gamma' | 'Γ' | 'F' | 'q0' | 'I' | 'B' | 'blank'"
            }
        }
    }
}

/// A declared set of names, with where each one was declared.
#[derive(Debug)]
struct NameSet {
    statement: Span,
    names: BTreeMap<String, Span>,
}

impl NameSet {
    fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    fn to_set<T: From<String> + Ord>(&self) -> BTreeSet<T> {
        self.names.keys().map(|name| T::from(name.clone())).collect()
    }
}

/// A single-name declaration such as `q0 = qa`.
#[derive(Debug, Clone, Copy)]
struct Single<'a> {
    name: &'a str,
    span: Span,
    statement: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptMode {
    FinalState,
    EmptyStack,
}

#[derive(Debug, Clone, Copy)]
struct Function<'a> {
    args: &'a Spanned<Vec<Spanned<Item>>>,
    value: &'a Spanned<Item>,
    statement: Span,
}

/// Everything a definition declares, gathered in one pass before any cross-checking so that
/// statement order does not matter.
#[derive(Debug, Default)]
struct Declarations<'a> {
    states: Option<NameSet>,
    alphabet: Option<NameSet>,
    symbols: Option<NameSet>,
    final_states: Option<NameSet>,
    initial_state: Option<Single<'a>>,
    initial_stack: Option<Single<'a>>,
    blank: Option<Single<'a>>,
    accept: Option<(AcceptMode, Span)>,
    functions: Vec<Function<'a>>,
}

impl<'a> Declarations<'a> {
    fn collect(
        statements: impl Iterator<Item = &'a Spanned<Statement>>,
        machine_type: MachineType,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let kind = machine_type.kind();
        let mut declarations = Declarations::default();

        for statement in statements {
            match &statement.node {
                Statement::Assignment { name, value } => {
                    declarations.assign(name, value, statement.span, kind, diagnostics)
                }
                Statement::Function { name, args, value } => {
                    if matches!(name.node.as_str(), "d" | "delta" | "δ") {
                        declarations.functions.push(Function {
                            args,
                            value,
                            statement: statement.span,
                        });
                    } else {
                        diagnostics.error(
                            format!(
                                "unknown function '{}', expected 'd' | 'delta' | 'δ'",
                                name.node
                            ),
                            name.span,
                        );
                    }
                }
            }
        }

        declarations
    }

    fn assign(
        &mut self,
        name: &'a Spanned<String>,
        value: &'a Spanned<Item>,
        statement: Span,
        kind: MachineKind,
        diagnostics: &mut Diagnostics,
    ) {
        if name.node == "type" {
            diagnostics.error("type already set", statement);
            return;
        }

        let key = match Key::parse(&name.node) {
            Some(key) if key.allowed(kind) => key,
            Some(key) => {
                diagnostics.error(
                    format!("{} cannot be declared for this machine type", key.what()),
                    name.span,
                );
                return;
            }
            None => {
                diagnostics
                    .error(format!("unknown item '{}'", name.node), name.span)
                    .help(format!("expected {}", Key::expected(kind)));
                return;
            }
        };

        match key {
            Key::States => {
                if let Some(set) = declare_set(&mut self.states, key, value, statement, diagnostics)
                {
                    if set.names.is_empty() {
                        diagnostics.error("states cannot be empty", statement);
                    }
                }
            }
            Key::Alphabet => {
                let declared = declare_set(&mut self.alphabet, key, value, statement, diagnostics);
                if let Some(set) = declared {
                    if set.names.is_empty() && kind != MachineKind::Tm {
                        diagnostics.error("alphabet cannot be empty", statement);
                    }
                    for (letter, span) in &set.names {
                        if letter.chars().count() != 1 {
                            diagnostics.error("letter cannot be longer than one char", *span);
                        }
                    }
                }
            }
            Key::Symbols => {
                if let Some(set) = declare_set(&mut self.symbols, key, value, statement, diagnostics)
                {
                    if set.names.is_empty() {
                        diagnostics.error("symbols cannot be empty", statement);
                    }
                }
            }
            Key::FinalStates => {
                declare_set(&mut self.final_states, key, value, statement, diagnostics);
            }
            Key::InitialState => {
                declare_single(&mut self.initial_state, key, value, statement, diagnostics)
            }
            Key::InitialStack => {
                declare_single(&mut self.initial_stack, key, value, statement, diagnostics)
            }
            Key::Blank => declare_single(&mut self.blank, key, value, statement, diagnostics),
            Key::Accept => self.declare_accept(value, statement, diagnostics),
        }
    }

    fn declare_accept(
        &mut self,
        value: &Spanned<Item>,
        statement: Span,
        diagnostics: &mut Diagnostics,
    ) {
        if let Some((_, previous)) = self.accept {
            diagnostics
                .error("acceptance mode already set", statement)
                .info("previously defined here", previous);
            return;
        }

        let mode = match &value.node {
            Item::Ident(mode) if mode == "F" => AcceptMode::FinalState,
            Item::Ident(mode) if mode == "N" || mode == "E" => AcceptMode::EmptyStack,
            _ => {
                diagnostics
                    .error("unknown acceptance mode, expected 'F' | 'N' | 'E'", value.span)
                    .help("F accepts in a final state, N or E accepts by empty stack");
                return;
            }
        };
        self.accept = Some((mode, statement));
    }
}

/// Records a `{...}` declaration in `slot` and returns it, unless `slot` was already taken or
/// the value is not a set.
fn declare_set<'s>(
    slot: &'s mut Option<NameSet>,
    key: Key,
    value: &Spanned<Item>,
    statement: Span,
    diagnostics: &mut Diagnostics,
) -> Option<&'s NameSet> {
    if let Some(previous) = slot.as_ref() {
        diagnostics
            .error(format!("{} already set", key.what()), statement)
            .info("previously defined here", previous.statement);
        return None;
    }

    let Item::Set(items) = &value.node else {
        diagnostics.error(
            format!("expected set, found {}", value.node.describe()),
            value.span,
        );
        return None;
    };

    let mut names: BTreeMap<String, Span> = BTreeMap::new();
    for item in items {
        let Some(name) = expect_ident(item, diagnostics) else {
            continue;
        };
        if let Some(previous) = names.insert(name.to_string(), item.span) {
            diagnostics
                .error(format!("{} redefined", key.singular()), item.span)
                .info("previously defined here", previous);
        }
    }

    Some(&*slot.insert(NameSet { statement, names }))
}

fn declare_single<'a>(
    slot: &mut Option<Single<'a>>,
    key: Key,
    value: &'a Spanned<Item>,
    statement: Span,
    diagnostics: &mut Diagnostics,
) {
    if let Some(previous) = *slot {
        diagnostics
            .error(format!("{} already set", key.what()), statement)
            .info("previously defined here", previous.statement);
        return;
    }

    if let Some(name) = expect_ident(value, diagnostics) {
        *slot = Some(Single {
            name,
            span: value.span,
            statement,
        });
    }
}

// ---------------------------------------------------------------------------
// Resolution helpers
// ---------------------------------------------------------------------------

fn expect_ident<'a>(item: &'a Spanned<Item>, diagnostics: &mut Diagnostics) -> Option<&'a str> {
    match &item.node {
        Item::Ident(name) => Some(name),
        other => {
            diagnostics.error(
                format!("expected identifier, found {}", other.describe()),
                item.span,
            );
            None
        }
    }
}

/// An identifier that must be a member of `declared`.
fn expect_declared<'a>(
    item: &'a Spanned<Item>,
    declared: &NameSet,
    message: &str,
    diagnostics: &mut Diagnostics,
) -> Option<&'a str> {
    let name = expect_ident(item, diagnostics)?;
    if declared.contains(name) {
        Some(name)
    } else {
        diagnostics.error(message, item.span);
        None
    }
}

/// A single member, or the members of a set: `q1` and `{q1}` mean the same target list.
fn set_weak(item: &Spanned<Item>) -> &[Spanned<Item>] {
    match &item.node {
        Item::Set(items) => items,
        _ => std::slice::from_ref(item),
    }
}

/// Same as [`set_weak`] for lists: `A` and `[A]` push the same symbol.
fn list_weak(item: &Spanned<Item>) -> &[Spanned<Item>] {
    match &item.node {
        Item::List(items) => items,
        _ => std::slice::from_ref(item),
    }
}

fn require<'s>(
    slot: &'s Option<NameSet>,
    message: &str,
    help: &str,
    diagnostics: &mut Diagnostics,
) -> Option<&'s NameSet> {
    if slot.is_none() {
        diagnostics.error_locless(message).help(help);
    }
    slot.as_ref()
}

/// Resolves an optional single-name declaration, falling back to `default` (with a warning)
/// when that name is declared in `members`.
fn resolve_single(
    single: Option<Single<'_>>,
    members: &NameSet,
    member_of: &str,
    what: &str,
    default: &str,
    diagnostics: &mut Diagnostics,
) -> String {
    match single {
        Some(single) => {
            if !members.contains(single.name) {
                diagnostics.error(format!("{what} not defined as {member_of}"), single.span);
            }
            single.name.to_string()
        }
        None => {
            if members.contains(default) {
                diagnostics
                    .warning_locless(format!("{what} not defined, defaulting to '{default}'"))
                    .help(format!("add: {default} = {default}"));
            } else {
                diagnostics
                    .error_locless(format!("{what} not defined"))
                    .help(format!("add: {default} = ..."));
            }
            default.to_string()
        }
    }
}

fn check_final_states(final_states: &NameSet, states: &NameSet, diagnostics: &mut Diagnostics) {
    for (name, span) in &final_states.names {
        if !states.contains(name) {
            diagnostics.error("final state not defined in set of states", *span);
        }
    }
}

fn letter_arg(
    item: &Spanned<Item>,
    alphabet: &NameSet,
    machine_type: MachineType,
    diagnostics: &mut Diagnostics,
) -> Option<Option<Letter>> {
    match &item.node {
        Item::Epsilon => {
            if machine_type.is_deterministic() {
                let allowed = match machine_type.kind() {
                    MachineKind::Pda => "NPDA",
                    _ => "NFA",
                };
                diagnostics
                    .error("epsilon moves not permitted", item.span)
                    .help(format!("use type = {allowed} to allow epsilon moves"));
            }
            Some(None)
        }
        Item::Ident(letter) => {
            if !alphabet.contains(letter) {
                diagnostics.error("transition letter not defined in alphabet", item.span);
            }
            Some(Some(Letter::from(letter.as_str())))
        }
        other => {
            diagnostics.error(
                format!("expected letter or epsilon, found {}", other.describe()),
                item.span,
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Transition tables
// ---------------------------------------------------------------------------

/// Targets that can tell whether they describe the same move, ignoring where they were written.
trait Move {
    fn same_move(&self, other: &Self) -> bool;
    fn transition(&self) -> Span;
}

impl Move for FaTarget {
    fn same_move(&self, other: &Self) -> bool {
        self.state == other.state
    }

    fn transition(&self) -> Span {
        self.transition
    }
}

impl Move for PdaTarget {
    fn same_move(&self, other: &Self) -> bool {
        self.state == other.state && self.push == other.push
    }

    fn transition(&self) -> Span {
        self.transition
    }
}

impl Move for TmTarget {
    fn same_move(&self, other: &Self) -> bool {
        self.state == other.state && self.write == other.write && self.direction == other.direction
    }

    fn transition(&self) -> Span {
        self.transition
    }
}

/// Transition table in first-seen source order, merging targets that share a source.
struct Table<S, T> {
    entries: Vec<(S, Vec<T>)>,
    index: HashMap<S, usize>,
    deterministic: bool,
}

impl<S: Clone + Eq + Hash, T: Move> Table<S, T> {
    fn new(deterministic: bool) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            deterministic,
        }
    }

    fn insert(&mut self, source: S, target: T, diagnostics: &mut Diagnostics) {
        let i = match self.index.get(&source) {
            Some(&i) => i,
            None => {
                self.index.insert(source.clone(), self.entries.len());
                self.entries.push((source, Vec::new()));
                self.entries.len() - 1
            }
        };

        let targets = &mut self.entries[i].1;
        if let Some(previous) = targets.iter().find(|t| t.same_move(&target)) {
            diagnostics
                .warning("duplicate transition", target.transition())
                .info("previously defined here", previous.transition());
        } else if self.deterministic && !targets.is_empty() {
            diagnostics
                .error(
                    "transition already defined for this starting point (non determinism not permitted)",
                    target.transition(),
                )
                .info("previously defined here", targets[0].transition());
        }
        targets.push(target);
    }

    fn into_entries(self) -> Vec<(S, Vec<T>)> {
        self.entries
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn build_fa(
    declarations: &Declarations<'_>,
    machine_type: MachineType,
    diagnostics: &mut Diagnostics,
) -> Option<FaDefinition> {
    let states = require(&declarations.states, "states never defined", "add: Q = {...}", diagnostics);
    let alphabet = require(&declarations.alphabet, "alphabet never defined", "add: E = {...}", diagnostics);
    let (states, alphabet) = (states?, alphabet?);

    if let Some(final_states) = &declarations.final_states {
        check_final_states(final_states, states, diagnostics);
    }
    let initial_state = resolve_single(
        declarations.initial_state,
        states,
        "a state",
        "initial state",
        DEFAULT_INITIAL_STATE,
        diagnostics,
    );

    let mut table = Table::new(machine_type.is_deterministic());
    for function in &declarations.functions {
        let [state, letter] = function.args.node.as_slice() else {
            diagnostics.error(
                "expected FA transition function (state, letter|ε)",
                function.args.span,
            );
            continue;
        };
        let state = expect_declared(state, states, "transition state not defined as state", diagnostics);
        let letter = letter_arg(letter, alphabet, machine_type, diagnostics);
        let (Some(state), Some(letter)) = (state, letter) else {
            continue;
        };

        for item in set_weak(function.value) {
            let Some(next) =
                expect_declared(item, states, "transition state not defined as state", diagnostics)
            else {
                continue;
            };
            let source = FaSource {
                state: State::from(state),
                letter: letter.clone(),
            };
            let target = FaTarget {
                state: State::from(next),
                function: function.statement,
                transition: item.span,
            };
            table.insert(source, target, diagnostics);
        }
    }

    Some(FaDefinition {
        initial_state: State::from(initial_state),
        states: states.to_set(),
        alphabet: alphabet.to_set(),
        final_states: declarations
            .final_states
            .as_ref()
            .map(|set| set.to_set())
            .unwrap_or_default(),
        transitions: table.into_entries(),
    })
}

fn build_pda(
    declarations: &Declarations<'_>,
    machine_type: MachineType,
    diagnostics: &mut Diagnostics,
) -> Option<PdaDefinition> {
    let states = require(&declarations.states, "states never defined", "add: Q = {...}", diagnostics);
    let alphabet = require(&declarations.alphabet, "alphabet never defined", "add: E = {...}", diagnostics);
    let symbols = require(
        &declarations.symbols,
        "stack symbols never defined",
        "add: T = {...}",
        diagnostics,
    );
    let (states, alphabet, symbols) = (states?, alphabet?, symbols?);

    let initial_state = resolve_single(
        declarations.initial_state,
        states,
        "a state",
        "initial state",
        DEFAULT_INITIAL_STATE,
        diagnostics,
    );
    let initial_stack = resolve_single(
        declarations.initial_stack,
        symbols,
        "a stack symbol",
        "initial stack symbol",
        DEFAULT_INITIAL_STACK,
        diagnostics,
    );

    if let Some(final_states) = &declarations.final_states {
        check_final_states(final_states, states, diagnostics);
    }
    let acceptance = match (declarations.accept, &declarations.final_states) {
        (Some((AcceptMode::FinalState, _)), Some(final_states)) => PdaAcceptance::FinalState {
            states: final_states.to_set(),
        },
        (Some((AcceptMode::FinalState, span)), None) => {
            diagnostics
                .error("final states never defined", span)
                .help("add: F = {...}");
            PdaAcceptance::EmptyStack
        }
        (Some((AcceptMode::EmptyStack, _)), final_states) => {
            if let Some(final_states) = final_states {
                diagnostics.warning(
                    "final states are ignored when accepting by empty stack",
                    final_states.statement,
                );
            }
            PdaAcceptance::EmptyStack
        }
        (None, Some(final_states)) => {
            diagnostics
                .warning_locless("acceptance mode not defined, defaulting to final state")
                .help("add: accept = F");
            PdaAcceptance::FinalState {
                states: final_states.to_set(),
            }
        }
        (None, None) => {
            diagnostics
                .warning_locless("acceptance mode not defined, defaulting to empty stack")
                .help("add: accept = N");
            PdaAcceptance::EmptyStack
        }
    };

    let mut table = Table::new(machine_type.is_deterministic());
    for function in &declarations.functions {
        let [state, letter, top] = function.args.node.as_slice() else {
            diagnostics.error(
                "expected PDA transition function (state, letter|ε, symbol)",
                function.args.span,
            );
            continue;
        };
        let state = expect_declared(state, states, "transition state not defined as state", diagnostics);
        let letter = letter_arg(letter, alphabet, machine_type, diagnostics);
        let top = expect_declared(
            top,
            symbols,
            "transition stack symbol not defined as stack symbol",
            diagnostics,
        );
        let (Some(state), Some(letter), Some(top)) = (state, letter, top) else {
            continue;
        };

        for item in set_weak(function.value) {
            let Item::Tuple(parts) = &item.node else {
                diagnostics.error("expected PDA transition (state, symbol|[symbols])", item.span);
                continue;
            };
            let [next, push] = parts.as_slice() else {
                diagnostics.error("expected PDA transition (state, symbol|[symbols])", item.span);
                continue;
            };
            let Some(next) =
                expect_declared(next, states, "transition state not defined as state", diagnostics)
            else {
                continue;
            };

            // Written top first; stored bottom first.
            let mut stack = Vec::new();
            for symbol in list_weak(push) {
                if symbol.node == Item::Epsilon {
                    continue;
                }
                if let Some(symbol) = expect_declared(
                    symbol,
                    symbols,
                    "transition stack symbol not defined",
                    diagnostics,
                ) {
                    stack.push(Symbol::from(symbol));
                }
            }
            stack.reverse();

            let source = PdaSource {
                state: State::from(state),
                letter: letter.clone(),
                symbol: Symbol::from(top),
            };
            let target = PdaTarget {
                state: State::from(next),
                push: stack,
                function: function.statement,
                transition: item.span,
            };
            table.insert(source, target, diagnostics);
        }
    }

    Some(PdaDefinition {
        initial_state: State::from(initial_state),
        initial_stack: Symbol::from(initial_stack),
        states: states.to_set(),
        alphabet: alphabet.to_set(),
        symbols: symbols.to_set(),
        acceptance,
        transitions: table.into_entries(),
    })
}

fn build_tm(
    declarations: &Declarations<'_>,
    machine_type: MachineType,
    diagnostics: &mut Diagnostics,
) -> Option<TmDefinition> {
    let states = require(&declarations.states, "states never defined", "add: Q = {...}", diagnostics);
    let symbols = require(
        &declarations.symbols,
        "tape symbols never defined",
        "add: T = {...}",
        diagnostics,
    );
    let final_states = require(
        &declarations.final_states,
        "final states never defined",
        "add: F = {...}",
        diagnostics,
    );
    let (states, symbols, final_states) = (states?, symbols?, final_states?);

    check_final_states(final_states, states, diagnostics);
    if let Some(alphabet) = &declarations.alphabet {
        for (letter, span) in &alphabet.names {
            if !symbols.contains(letter) {
                diagnostics.error("input letter not defined as tape symbol", *span);
            }
        }
    }

    let initial_state = resolve_single(
        declarations.initial_state,
        states,
        "a state",
        "initial state",
        DEFAULT_INITIAL_STATE,
        diagnostics,
    );
    let blank = resolve_single(
        declarations.blank,
        symbols,
        "a tape symbol",
        "blank symbol",
        DEFAULT_BLANK_SYMBOL,
        diagnostics,
    );

    let mut table = Table::new(machine_type.is_deterministic());
    for function in &declarations.functions {
        let [state, read] = function.args.node.as_slice() else {
            diagnostics.error(
                "expected TM transition function (state, symbol)",
                function.args.span,
            );
            continue;
        };
        let state = expect_declared(state, states, "transition state not defined as state", diagnostics);
        let read = expect_declared(read, symbols, "transition tape symbol not defined", diagnostics);
        let (Some(state), Some(read)) = (state, read) else {
            continue;
        };

        for item in set_weak(function.value) {
            let Item::Tuple(parts) = &item.node else {
                diagnostics.error("expected TM transition (state, symbol, direction)", item.span);
                continue;
            };
            let [next, write, direction] = parts.as_slice() else {
                diagnostics.error("expected TM transition (state, symbol, direction)", item.span);
                continue;
            };
            let next =
                expect_declared(next, states, "transition state not defined as state", diagnostics);
            let write =
                expect_declared(write, symbols, "transition tape symbol not defined", diagnostics);
            let direction = parse_direction(direction, diagnostics);
            let (Some(next), Some(write), Some(direction)) = (next, write, direction) else {
                continue;
            };

            let source = TmSource {
                state: State::from(state),
                symbol: Symbol::from(read),
            };
            let target = TmTarget {
                state: State::from(next),
                write: Symbol::from(write),
                direction,
                function: function.statement,
                transition: item.span,
            };
            table.insert(source, target, diagnostics);
        }
    }

    Some(TmDefinition {
        initial_state: State::from(initial_state),
        blank: Symbol::from(blank),
        states: states.to_set(),
        alphabet: declarations
            .alphabet
            .as_ref()
            .map(|set| set.to_set())
            .unwrap_or_default(),
        symbols: symbols.to_set(),
        final_states: final_states.to_set(),
        transitions: table.into_entries(),
    })
}

/// Supports `L`, `left` or `<` for Left, `R`, `right` or `>` for Right, and `S`, `stay` or
/// epsilon for Stay.
fn parse_direction(item: &Spanned<Item>, diagnostics: &mut Diagnostics) -> Option<Direction> {
    match &item.node {
        Item::Epsilon => Some(Direction::Stay),
        Item::Ident(direction) => match direction.as_str() {
            "L" | "left" | "<" => Some(Direction::Left),
            "R" | "right" | ">" => Some(Direction::Right),
            "S" | "stay" => Some(Direction::Stay),
            other => {
                diagnostics
                    .error(format!("invalid direction specified '{other}'"), item.span)
                    .help("expected 'L' | 'R' | 'S' | '<' | '>' | '~'");
                None
            }
        },
        other => {
            diagnostics.error(
                format!("expected direction, found {}", other.describe()),
                item.span,
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Level;

    fn messages(compilation: &Compilation, level: Level) -> Vec<&str> {
        compilation
            .diagnostics
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.message.as_str())
            .collect()
    }

    fn pda_definition(src: &str) -> PdaDefinition {
        match compile(src).machine.map(|m| m.definition()) {
            Some(crate::machine::MachineDefinition::Pda(definition)) => definition,
            other => panic!("expected a PDA, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_dfa() {
        let src = r#"
type = DFA
Q = {q0, q1}
E = {a, b}
F = {q1}
q0 = q0
d(q0, a) = q1
d(q1, b) = {q0}
"#;
        let compilation = compile(src);
        assert!(!compilation.has_errors(), "{}", compilation.render(src));

        let machine = compilation.machine.unwrap();
        assert_eq!(machine.kind(), MachineKind::Fa);
        assert_eq!(machine.initial_state().as_str(), "q0");
        assert_eq!(machine.transition_count(), 2);
    }

    #[test]
    fn test_missing_type() {
        let compilation = compile("Q = {q0}");
        assert!(compilation.machine.is_none());
        assert_eq!(
            messages(&compilation, Level::Error),
            vec!["expected type=<type> as first item"]
        );
        assert_eq!(compilation.diagnostics[0].notes[0].message, "add: type = ...");

        let compilation = compile("");
        assert_eq!(compilation.diagnostics[0].span, Some(Span::new(0, 0)));
    }

    #[test]
    fn test_unknown_type() {
        let compilation = compile("type = LBA");
        assert_eq!(
            messages(&compilation, Level::Error),
            vec!["unknown type, expected 'DFA' | 'NFA' | 'DPDA' | 'NPDA' | 'TM' | 'NTM'"]
        );
        assert!(MachineType::parse("npda").is_some());
    }

    #[test]
    fn test_undeclared_state_points_at_it() {
        let src = "type = DFA\nQ = {q0}\nE = {a}\nd(q9, a) = q0";
        let compilation = compile(src);

        assert!(compilation.machine.is_none());
        let error = compilation.errors().next().unwrap();
        assert_eq!(error.message, "transition state not defined as state");
        let span = error.span.unwrap();
        assert_eq!(&src[span.start..span.end], "q9");
    }

    #[test]
    fn test_epsilon_not_permitted_in_dfa() {
        let src = "type = DFA\nQ = {q0, q1}\nE = {a}\nd(q0, ~) = q1";
        let compilation = compile(src);
        assert_eq!(messages(&compilation, Level::Error), vec!["epsilon moves not permitted"]);

        let nfa = src.replace("DFA", "NFA");
        assert!(compile(&nfa).machine.is_some());
    }

    #[test]
    fn test_nondeterminism_not_permitted_in_dfa() {
        let src = "type = DFA\nQ = {q0, q1}\nE = {a}\nd(q0, a) = {q0, q1}";
        let compilation = compile(src);
        assert_eq!(
            messages(&compilation, Level::Error),
            vec!["transition already defined for this starting point (non determinism not permitted)"]
        );
        assert_eq!(compilation.errors().next().unwrap().notes.len(), 1);
    }

    #[test]
    fn test_duplicate_transition_is_a_warning_and_kept() {
        let src = "type = DFA\nQ = {q0, q1}\nE = {a}\nd(q0, a) = q1\nd(q0, a) = q1";
        let compilation = compile(src);

        assert!(!compilation.has_errors());
        assert!(messages(&compilation, Level::Warning).contains(&"duplicate transition"));
        assert_eq!(compilation.machine.unwrap().transition_count(), 2);
    }

    #[test]
    fn test_pda_push_is_written_top_first() {
        let definition = pda_definition(
            r#"
type = NPDA
Q = {q}
E = {a}
T = {Z0, A, B}
z0 = Z0
q0 = q
accept = N
d(q, a, Z0) = (q, [A B Z0])
d(q, a, A) = {(q, ~), (q, B)}
"#,
        );

        let (_, targets) = &definition.transitions[0];
        let push: Vec<&str> = targets[0].push.iter().map(Symbol::as_str).collect();
        assert_eq!(push, vec!["Z0", "B", "A"]);

        let (_, targets) = &definition.transitions[1];
        assert!(targets[0].push.is_empty());
        assert_eq!(targets[1].push, vec![Symbol::from("B")]);
        assert_eq!(definition.acceptance, PdaAcceptance::EmptyStack);
    }

    #[test]
    fn test_pda_acceptance_defaults() {
        let base = "type = NPDA\nQ = {q0}\nE = {a}\nT = {z0}\nd(q0, a, z0) = (q0, z0)\n";

        let compilation = compile(base);
        assert!(messages(&compilation, Level::Warning)
            .contains(&"acceptance mode not defined, defaulting to empty stack"));

        let with_finals = format!("{base}F = {{q0}}");
        let definition = pda_definition(&with_finals);
        assert!(matches!(definition.acceptance, PdaAcceptance::FinalState { .. }));

        let explicit = format!("{base}accept = F");
        let compilation = compile(&explicit);
        assert_eq!(messages(&compilation, Level::Error), vec!["final states never defined"]);
    }

    #[test]
    fn test_defaults_warn_when_declared() {
        let compilation = compile("type = DFA\nQ = {q0}\nE = {a}\nd(q0, a) = q0");
        assert!(compilation.machine.is_some());
        assert!(messages(&compilation, Level::Warning)
            .contains(&"initial state not defined, defaulting to 'q0'"));

        let compilation = compile("type = DFA\nQ = {qa}\nE = {a}");
        assert_eq!(messages(&compilation, Level::Error), vec!["initial state not defined"]);
    }

    #[test]
    fn test_tm_requirements() {
        let compilation = compile("type = TM\nQ = {q0}\nT = {a}\nF = {q0}");
        assert_eq!(messages(&compilation, Level::Error), vec!["blank symbol not defined"]);

        let compilation = compile("type = TM\nQ = {q0}\nT = {a, B}\nF = {q0}\nd(q0, a) = (q0, a, U)");
        assert_eq!(
            messages(&compilation, Level::Error),
            vec!["invalid direction specified 'U'"]
        );

        let compilation = compile("type = TM\nQ = {q0}\nT = {B}\nE = {a}\nF = {q0}");
        assert_eq!(
            messages(&compilation, Level::Error),
            vec!["input letter not defined as tape symbol"]
        );
    }

    #[test]
    fn test_declaration_errors() {
        let src = "type = DFA\nQ = {q0, q0}\nQ = {q1}\nE = {ab}\nB = B\nfoo = bar\nf(q0) = q0";
        let compilation = compile(src);
        assert_eq!(
            messages(&compilation, Level::Error),
            vec![
                "state redefined",
                "states already set",
                "letter cannot be longer than one char",
                "blank symbol cannot be declared for this machine type",
                "unknown item 'foo'",
                "unknown function 'f', expected 'd' | 'delta' | 'δ'",
            ]
        );
    }

    #[test]
    fn test_statement_order_does_not_matter() {
        let src = "type = NFA\nd(q0, a) = q1\nF = {q1}\nE = {a}\nQ = {q0, q1}\nq0 = q0";
        assert!(compile(src).machine.is_some());
    }

    #[test]
    fn test_syntax_error_is_single_diagnostic() {
        let compilation = compile("type = DFA\nQ = {q0");
        assert_eq!(compilation.diagnostics.len(), 1);
        assert!(compilation.diagnostics[0].message.starts_with("syntax error"));
        assert!(compilation.diagnostics[0].span.is_some());
    }

    #[test]
    fn test_source_size_limit() {
        let src = format!("type = DFA\n{}", " ".repeat(MAX_SOURCE_SIZE));
        let compilation = compile(&src);
        assert!(compilation.errors().next().unwrap().message.contains("too large"));
    }

    #[test]
    fn test_into_result() {
        let error = compile("type = DFA").into_result().unwrap_err();
        assert!(matches!(error, AutomataError::CompileError(_)));
        assert!(error.to_string().starts_with("Compilation failed: states never defined"));
    }
}

//! This module provides the parser for machine definitions, utilizing the `pest` crate.
//! It turns source text into a flat list of spanned statements; giving them meaning is the
//! compiler's job.

use pest::{
    error::{Error, ErrorVariant, InputLocation},
    iterators::Pair,
    Parser as PestParser,
};
use pest_derive::Parser as PestParser;

use crate::types::{AutomataError, Span};

/// Derives a `PestParser` for the definition grammar in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct AutomataParser;

/// A value paired with the source range it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A right-hand side value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Ident(String),
    Epsilon,
    /// `( ... )`
    Tuple(Vec<Spanned<Item>>),
    /// `{ ... }`
    Set(Vec<Spanned<Item>>),
    /// `[ ... ]`
    List(Vec<Spanned<Item>>),
}

impl Item {
    /// Short description used in "expected X, found Y" messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Item::Ident(_) => "identifier",
            Item::Epsilon => "epsilon",
            Item::Tuple(_) => "tuple",
            Item::Set(_) => "set",
            Item::List(_) => "list",
        }
    }
}

/// One top-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `name = value`
    Assignment {
        name: Spanned<String>,
        value: Spanned<Item>,
    },
    /// `name(args) = value`
    Function {
        name: Spanned<String>,
        args: Spanned<Vec<Spanned<Item>>>,
        value: Spanned<Item>,
    },
}

/// Parses `input` into statements, in source order.
///
/// Spans are byte offsets into `input` itself (it is not trimmed), so diagnostics can point
/// straight back into the text the user wrote.
pub fn parse(input: &str) -> Result<Vec<Spanned<Statement>>, AutomataError> {
    let root = AutomataParser::parse(Rule::program, input)
        .map_err(|e| AutomataError::ParseError(Box::new(e)))?
        .next()
        .ok_or_else(|| AutomataError::ValidationError("empty parse tree".into()))?;

    root.into_inner()
        .filter(|pair| pair.as_rule() != Rule::EOI)
        .map(parse_statement)
        .collect()
}

/// Byte range a pest error points at.
pub fn error_span(error: &Error<Rule>) -> Span {
    match error.location {
        InputLocation::Pos(pos) => Span::new(pos, pos),
        InputLocation::Span((start, end)) => Span::new(start, end),
    }
}

/// Human readable message of a pest error, without pest's own location banner.
pub fn error_message(error: &Error<Rule>) -> String {
    match &error.variant {
        ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let expected: Vec<String> = positives.iter().map(describe_rule).collect();
            format!("syntax error, expected {}", expected.join(" | "))
        }
        variant => format!("syntax error: {}", variant.message()),
    }
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::ident => "identifier".into(),
        Rule::epsilon => "epsilon".into(),
        Rule::tuple => "'('".into(),
        Rule::set => "'{'".into(),
        Rule::list => "'['".into(),
        Rule::function | Rule::assignment => "statement".into(),
        Rule::EOI => "end of input".into(),
        other => format!("{other:?}"),
    }
}

fn parse_statement(pair: Pair<Rule>) -> Result<Spanned<Statement>, AutomataError> {
    let span = Span::from(pair.as_span());
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();

    let statement = match (rule, inner.next(), inner.next(), inner.next()) {
        (Rule::assignment, Some(name), Some(value), None) => Statement::Assignment {
            name: parse_name(name),
            value: parse_item(value)?,
        },
        (Rule::function, Some(name), Some(args), Some(value)) => {
            let args_span = Span::from(args.as_span());
            Statement::Function {
                name: parse_name(name),
                args: Spanned::new(parse_elements(args)?, args_span),
                value: parse_item(value)?,
            }
        }
        _ => return Err(malformed(span)),
    };

    Ok(Spanned::new(statement, span))
}

fn parse_name(pair: Pair<Rule>) -> Spanned<String> {
    Spanned::new(pair.as_str().to_string(), pair.as_span().into())
}

fn parse_item(pair: Pair<Rule>) -> Result<Spanned<Item>, AutomataError> {
    let span = Span::from(pair.as_span());
    let item = match pair.as_rule() {
        Rule::ident => Item::Ident(pair.as_str().to_string()),
        Rule::epsilon => Item::Epsilon,
        Rule::tuple => Item::Tuple(parse_elements(pair)?),
        Rule::set => Item::Set(parse_elements(pair)?),
        Rule::list => Item::List(parse_elements(pair)?),
        _ => return Err(malformed(span)),
    };

    Ok(Spanned::new(item, span))
}

fn parse_elements(pair: Pair<Rule>) -> Result<Vec<Spanned<Item>>, AutomataError> {
    pair.into_inner().map(parse_item).collect()
}

fn malformed(span: Span) -> AutomataError {
    AutomataError::ValidationError(format!(
        "unexpected parse tree shape at {}..{}",
        span.start, span.end
    ))
}

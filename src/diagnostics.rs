//! Compiler diagnostics: leveled messages with optional source spans, attached notes, and a
//! plain-text renderer that points into the source.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Span;

/// Severity of a diagnostic or note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
    Help,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Help => "help",
        })
    }
}

/// Secondary message attached to a diagnostic ("previously defined here", "add: q0 = ...").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub level: Level,
    pub message: String,
    pub span: Option<Span>,
}

/// A single compiler message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn new(level: Level, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            level,
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(Level::Error, message, span)
    }

    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(Level::Warning, message, span)
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }

    /// Attaches a help note without a location.
    pub fn help(&mut self, message: impl Into<String>) -> &mut Self {
        self.notes.push(Note {
            level: Level::Help,
            message: message.into(),
            span: None,
        });
        self
    }

    /// Attaches an informational note pointing at `span`.
    pub fn info(&mut self, message: impl Into<String>, span: Span) -> &mut Self {
        self.notes.push(Note {
            level: Level::Info,
            message: message.into(),
            span: Some(span),
        });
        self
    }

    /// Renders the diagnostic against the source it was produced from.
    ///
    /// ```text
    /// error: transition state not defined as state
    ///  --> 4:3
    ///   |
    /// 4 | d(q9, a) = q1
    ///   |   ^^
    /// ```
    pub fn render(&self, src: &str) -> String {
        let mut out = format!("{}: {}", self.level, self.message);
        if let Some(span) = self.span {
            render_excerpt(&mut out, src, span);
        }
        for note in &self.notes {
            out.push_str(&format!("\n  = {}: {}", note.level, note.message));
            if let Some(span) = note.span {
                let (line, col) = line_col(src, span.start);
                out.push_str(&format!(" ({line}:{col})"));
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

/// Collects diagnostics while compiling and remembers whether any of them is an error.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    has_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) -> &mut Diagnostic {
        self.has_error |= diagnostic.is_error();
        self.entries.push(diagnostic);
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) -> &mut Diagnostic {
        self.emit(Diagnostic::error(message, Some(span)))
    }

    pub fn error_locless(&mut self, message: impl Into<String>) -> &mut Diagnostic {
        self.emit(Diagnostic::error(message, None))
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) -> &mut Diagnostic {
        self.emit(Diagnostic::warning(message, Some(span)))
    }

    pub fn warning_locless(&mut self, message: impl Into<String>) -> &mut Diagnostic {
        self.emit(Diagnostic::warning(message, None))
    }

    pub fn has_errors(&self) -> bool {
        self.has_error
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        for diagnostic in iter {
            self.emit(diagnostic);
        }
    }
}

/// 1-based line and column (in chars) of a byte offset.
pub fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(src.len());
    let before = src.get(..offset).unwrap_or(src);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let col = before[line_start..].chars().count() + 1;
    (line, col)
}

fn render_excerpt(out: &mut String, src: &str, span: Span) {
    let (line, col) = line_col(src, span.start);
    let text = src.lines().nth(line - 1).unwrap_or("");
    let gutter = " ".repeat(line.to_string().len());

    let width = src
        .get(span.start..span.end.max(span.start))
        .map(|s| s.lines().next().unwrap_or("").chars().count())
        .unwrap_or(0)
        .max(1);

    out.push_str(&format!("\n{gutter}--> {line}:{col}"));
    out.push_str(&format!("\n{gutter} |"));
    out.push_str(&format!("\n{line} | {text}"));
    out.push_str(&format!(
        "\n{gutter} | {}{}",
        " ".repeat(col - 1),
        "^".repeat(width)
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let src = "type = DFA\nQ = {q0}\n";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 11), (2, 1));
        assert_eq!(line_col(src, 16), (2, 6));
    }

    #[test]
    fn test_collector_tracks_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warning_locless("initial state not defined, defaulting to 'q0'");
        assert!(!diagnostics.has_errors());

        diagnostics
            .error("state redefined", Span::new(5, 7))
            .info("previously defined here", Span::new(1, 3));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.entries()[1].notes.len(), 1);
    }

    #[test]
    fn test_render_points_at_span() {
        let src = "type = DFA\nd(q9, a) = q1";
        let diagnostic = Diagnostic::error("transition state not defined as state", Some(Span::new(13, 15)));

        let rendered = diagnostic.render(src);
        assert!(rendered.starts_with("error: transition state not defined as state"));
        assert!(rendered.contains("--> 2:3"));
        assert!(rendered.contains("2 | d(q9, a) = q1"));
        assert!(rendered.ends_with("   ^^"));
    }
}

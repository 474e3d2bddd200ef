//! Diagnostic reporting for fragment and query sources.

use crate::span::Span;
use miette::{NamedSource, SourceSpan};
use thiserror::Error;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// The document cannot be used.
    Error,
    /// The document is usable but suspicious.
    Warning,
}

/// A label attached to a diagnostic.
#[derive(Debug, Clone)]
pub struct Label {
    /// The span this label points to.
    pub span: Span,
    /// The label message.
    pub message: String,
}

impl Label {
    /// Creates a new label.
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

/// A diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: DiagnosticSeverity,
    /// Error code.
    pub code: String,
    /// Short title.
    pub title: String,
    /// Labels pointing to source locations.
    pub labels: Vec<Label>,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn error(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            code: code.into(),
            title: title.into(),
            labels: Vec::new(),
        }
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            code: code.into(),
            title: title.into(),
            labels: Vec::new(),
        }
    }

    /// Adds a primary label at a span.
    pub fn with_span(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::new(span, message));
        self
    }

    /// Returns the primary span, if any.
    pub fn primary_span(&self) -> Option<Span> {
        self.labels.first().map(|l| l.span)
    }

    /// Renders a single line `line:col: [code] title: label`.
    pub fn render_line(&self, source: &str) -> String {
        match self.labels.first() {
            Some(label) => {
                let (line, col) = label.span.line_col(source);
                format!(
                    "{line}:{col}: [{}] {}: {}",
                    self.code, self.title, label.message
                )
            }
            None => format!("[{}] {}", self.code, self.title),
        }
    }
}

/// A collection of diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    /// Creates a new empty diagnostic bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Adds an error diagnostic.
    pub fn error(
        &mut self,
        code: impl Into<String>,
        title: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) {
        self.add(Diagnostic::error(code, title).with_span(span, message));
    }

    /// Adds a warning diagnostic.
    pub fn warning(
        &mut self,
        code: impl Into<String>,
        title: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) {
        self.add(Diagnostic::warning(code, title).with_span(span, message));
    }

    /// Returns true if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns the number of errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Returns an iterator over errors.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Joins all errors into one `line:col` separated summary.
    #[must_use]
    pub fn summary(&self, source: &str) -> String {
        self.errors()
            .map(|d| d.render_line(source))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Converts the first error into a renderable miette report.
    #[must_use]
    pub fn to_syntax_error(&self, name: &str, source: &str) -> Option<SyntaxError> {
        let first = self.errors().next()?;
        let span = first.primary_span().unwrap_or_default();
        Some(SyntaxError {
            title: first.title.clone(),
            label: first
                .labels
                .first()
                .map_or_else(|| first.title.clone(), |l| l.message.clone()),
            src: NamedSource::new(name, source.to_string()),
            span: span.into(),
            help: match self.error_count() {
                0 | 1 => None,
                n => Some(format!("{} more error(s) in this file", n - 1)),
            },
        })
    }
}

/// A syntax error rendered with source context.
#[derive(Debug, Error, miette::Diagnostic)]
#[error("{title}")]
#[diagnostic(code(gqlsrc::syntax))]
pub struct SyntaxError {
    title: String,
    label: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
}

/// Common diagnostic codes.
pub mod codes {
    pub const UNEXPECTED_TOKEN: &str = "E0001";
    pub const UNEXPECTED_EOF: &str = "E0002";
    pub const INVALID_SYNTAX: &str = "E0003";
    pub const UNSUPPORTED_DEFINITION: &str = "E0004";
    pub const DUPLICATE_FRAGMENT: &str = "E0010";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_bag() {
        let mut bag = DiagnosticBag::new();
        bag.error("E001", "test error", Span::new(0, 10), "details");
        bag.warning("W001", "test warning", Span::new(0, 1), "hint");

        assert!(bag.has_errors());
        assert_eq!(bag.error_count(), 1);
        assert_eq!(bag.iter().count(), 2);
    }

    #[test]
    fn test_render_line() {
        let source = "fragment A on A {\n  ???\n}";
        let diag = Diagnostic::error(codes::INVALID_SYNTAX, "invalid syntax")
            .with_span(Span::new(20, 21), "expected name");
        assert_eq!(
            diag.render_line(source),
            "2:3: [E0003] invalid syntax: expected name"
        );
    }

    #[test]
    fn test_to_syntax_error() {
        let mut bag = DiagnosticBag::new();
        assert!(bag.to_syntax_error("A.graphql", "").is_none());

        bag.error(codes::UNEXPECTED_EOF, "unexpected end", Span::new(3, 3), "eof");
        let err = bag.to_syntax_error("A.graphql", "abc").unwrap();
        assert_eq!(err.to_string(), "unexpected end");
    }
}

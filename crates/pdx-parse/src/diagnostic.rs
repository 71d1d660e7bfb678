//! Diagnostics and parser recovery markers.

use std::fmt;

use ariadne::{Color, Label, Report, ReportKind, Source};
use pdx_tokenizer::{Range, Span};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

/// Which stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSource {
    /// Parser recovery markers.
    Syntax,
    /// Rule engine checks driven by a schema.
    Schema,
    /// Checks that consult the workspace symbol index.
    Semantic,
}

impl DiagnosticSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticSource::Syntax => "syntax",
            DiagnosticSource::Schema => "schema",
            DiagnosticSource::Semantic => "semantic",
        }
    }
}

/// A message attached to a source location. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub range: Range,
    pub span: Span,
    pub source: DiagnosticSource,
    /// Replacement text the user most likely meant.
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        source: DiagnosticSource,
        code: impl Into<String>,
        message: impl Into<String>,
        range: Range,
        span: Span,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            range,
            span,
            source,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Render this diagnostic with ariadne.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| format!("{}", self))
    }

    /// Write the report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let range: std::ops::Range<usize> = self.span.into();
        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Information | Severity::Hint => ReportKind::Advice,
        };
        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
            Severity::Information | Severity::Hint => Color::Blue,
        };
        let mut report = Report::build(kind, (filename, range.clone()))
            .with_code(&self.code)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, range))
                    .with_message(self.source.as_str())
                    .with_color(color),
            );
        if let Some(suggestion) = &self.suggestion {
            report = report.with_help(format!("did you mean `{}`?", suggestion));
        }
        let _ = report
            .finish()
            .write((filename, Source::from(source)), writer);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.range.start, self.code, self.message
        )
    }
}

/// Parser recovery kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// `{` never closed; the block was closed at end of input.
    UnclosedBlock,
    /// `}` with no open block.
    UnmatchedCloseBrace,
    /// Operator not followed by a value.
    MissingValue,
    /// Quoted string missing its closing quote.
    UnterminatedString,
    /// Token that cannot start or continue an entry.
    UnexpectedToken(String),
    /// Braces nested deeper than [`crate::MAX_DEPTH`]; the contents were skipped.
    NestingTooDeep,
}

impl ParseErrorKind {
    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            ParseErrorKind::UnclosedBlock => "unclosed-block",
            ParseErrorKind::UnmatchedCloseBrace => "unmatched-close-brace",
            ParseErrorKind::MissingValue => "missing-value",
            ParseErrorKind::UnterminatedString => "unterminated-string",
            ParseErrorKind::UnexpectedToken(_) => "unexpected-token",
            ParseErrorKind::NestingTooDeep => "nesting-too-deep",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnclosedBlock => write!(f, "unclosed block: missing '}}'"),
            ParseErrorKind::UnmatchedCloseBrace => write!(f, "unmatched '}}'"),
            ParseErrorKind::MissingValue => write!(f, "expected a value after the operator"),
            ParseErrorKind::UnterminatedString => write!(f, "unterminated string"),
            ParseErrorKind::UnexpectedToken(text) => write!(f, "unexpected '{}'", text),
            ParseErrorKind::NestingTooDeep => write!(f, "blocks nested too deeply"),
        }
    }
}

/// A recovery marker with its location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub range: Range,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span, range: Range) -> Self {
        Self { kind, span, range }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(
            Severity::Error,
            DiagnosticSource::Syntax,
            self.kind.code(),
            self.kind.to_string(),
            self.range,
            self.span,
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.range.start)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn test_render_unclosed_block() {
        let source = "a = {\n  b = 1";
        let ast = parse(source);
        let diagnostics = ast.diagnostics();
        assert_eq!(diagnostics.len(), 1);

        let rendered = diagnostics[0].render("test.txt", source);
        let stripped = String::from_utf8(strip_ansi_escapes::strip(rendered)).unwrap();
        assert!(stripped.contains("unclosed-block"), "{stripped}");
        assert!(stripped.contains("missing '}'"), "{stripped}");
        assert!(stripped.contains("test.txt"), "{stripped}");
    }

    #[test]
    fn test_display_includes_code_and_position() {
        let ast = parse("}");
        let d = &ast.diagnostics()[0];
        insta::assert_snapshot!(d.to_string(), @"1:1 [unmatched-close-brace] unmatched '}'");
    }
}

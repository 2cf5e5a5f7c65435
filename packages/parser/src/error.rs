//! Error types for the formset parsers

use crate::lexer::{LexError, TokenSpan};
use thiserror::Error;

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse error with location and context
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected token at {span:?}: expected {expected}, found {found}")]
    UnexpectedToken {
        span: TokenSpan,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of input: expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("Invalid syntax at {span:?}: {message}")]
    InvalidSyntax { span: TokenSpan, message: String },

    #[error("Lexer error at {span:?}: {message}")]
    LexError { span: TokenSpan, message: String },

    #[error("Unknown command '{name}' at {span:?}")]
    UnknownCommand { span: TokenSpan, name: String },

    #[error("Command '{name}' at {span:?} {message}")]
    InvalidArguments {
        span: TokenSpan,
        name: String,
        message: String,
    },

    #[error("Empty {what}")]
    Empty { what: &'static str },
}

impl ParseError {
    pub fn unexpected_token(
        span: TokenSpan,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::UnexpectedToken {
            span,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(expected: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            expected: expected.into(),
        }
    }

    pub fn invalid_syntax(span: TokenSpan, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            span,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(span: TokenSpan, name: &str, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            span,
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<TokenSpan> {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::InvalidSyntax { span, .. }
            | ParseError::LexError { span, .. }
            | ParseError::UnknownCommand { span, .. }
            | ParseError::InvalidArguments { span, .. } => Some(*span),
            ParseError::UnexpectedEof { .. } | ParseError::Empty { .. } => None,
        }
    }

    fn label(&self) -> String {
        match self {
            ParseError::UnexpectedToken { expected, .. } | ParseError::UnexpectedEof { expected } => {
                format!("expected {}", expected)
            }
            ParseError::InvalidSyntax { message, .. }
            | ParseError::LexError { message, .. }
            | ParseError::InvalidArguments { message, .. } => message.clone(),
            ParseError::UnknownCommand { name, .. } => format!("'{}' is not a command", name),
            ParseError::Empty { what } => format!("{} is empty", what),
        }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::LexError {
            span: e.span,
            message: e.message,
        }
    }
}

/// Pretty-print an error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, origin: &str, error: &ParseError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let span = error.span().unwrap_or(TokenSpan {
        start: source.len().saturating_sub(1),
        end: source.len(),
    });

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, origin, span.start)
        .with_message(error.to_string())
        .with_label(
            Label::new((origin, span.start..span.end))
                .with_color(Color::Red)
                .with_message(error.label()),
        )
        .finish();

    if report.write((origin, Source::from(source)), &mut output).is_err() {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}

/// Plain-text fallback when ariadne is not compiled in
#[cfg(not(feature = "pretty-errors"))]
pub fn format_error(source: &str, origin: &str, error: &ParseError) -> String {
    match error.span() {
        Some(span) => format!(
            "{}: {} ({})\n  {}\n  {}^",
            origin,
            error,
            error.label(),
            source,
            " ".repeat(span.start)
        ),
        None => format!("{}: {} ({})", origin, error, error.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_accessor() {
        let err = ParseError::unexpected_token(TokenSpan::new(3, 5), "')'", "'=='");
        assert_eq!(err.span(), Some(TokenSpan::new(3, 5)));
        assert_eq!(ParseError::unexpected_eof("expression").span(), None);
    }

    #[test]
    fn test_format_error_mentions_origin() {
        let source = "a == ";
        let err = ParseError::unexpected_eof("expression");
        let text = format_error(source, "email.show-if", &err);
        assert!(text.contains("email.show-if"));
    }
}

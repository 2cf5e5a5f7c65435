use crate::error::{ParseError, ParseResult};
use crate::lexer::{lex, SpannedToken, Token, TokenSpan};

/// Token stream with single-token lookahead, shared by both parsers
pub(crate) struct TokenCursor<'src> {
    tokens: Vec<SpannedToken<'src>>,
    pos: usize,
    source_len: usize,
}

impl<'src> TokenCursor<'src> {
    /// Lex the whole source up front; the first lexer error aborts parsing
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let tokens = lex(source).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            tokens,
            pos: 0,
            source_len: source.len(),
        })
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    pub fn advance(&mut self) -> Option<SpannedToken<'src>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// True when the next token has the same variant as `expected`
    pub fn check(&self, expected: &Token) -> bool {
        self.peek()
            .map(|t| std::mem::discriminant(t) == std::mem::discriminant(expected))
            .unwrap_or(false)
    }

    pub fn match_token(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, expected: &Token) -> ParseResult<TokenSpan> {
        if self.check(expected) {
            let span = self.peek_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.error_here(expected.describe()))
        }
    }

    /// Span of the next token, or an empty span at end of input
    pub fn peek_span(&self) -> TokenSpan {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or(TokenSpan::new(self.source_len, self.source_len))
    }

    /// Span of the most recently consumed token
    pub fn previous_span(&self) -> TokenSpan {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.span)
            .unwrap_or(TokenSpan::new(0, 0))
    }

    /// Build the error for "expected X here"
    pub fn error_here(&self, expected: impl Into<String>) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(t) => ParseError::unexpected_token(t.span, expected, t.token.describe()),
            None => ParseError::unexpected_eof(expected),
        }
    }
}

/// Resolve backslash escapes inside a quoted literal
pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

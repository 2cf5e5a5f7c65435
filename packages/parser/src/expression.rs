//! Recursive-descent parser for condition expressions
//!
//! ```text
//! expr       := or
//! or         := and (("||" | "or") and)*
//! and        := unary (("&&" | "and") unary)*
//! unary      := ("!" | "not") unary | comparison
//! comparison := primary ((cmp_op | "in") primary)*
//! primary    := literal | path | list | "(" expr ")"
//! path       := ident ("." ident)*
//! list       := "[" (expr ("," expr)*)? "]"
//! ```

use crate::ast::{CompareOp, Expr, Literal, PathRef};
use crate::cursor::{unescape, TokenCursor};
use crate::error::{ParseError, ParseResult};
use crate::lexer::Token;

/// Parser for `show-if` / `hide-if` / `disable-if` attribute text
pub struct ExpressionParser<'src> {
    cursor: TokenCursor<'src>,
}

impl<'src> ExpressionParser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        Ok(Self {
            cursor: TokenCursor::new(source)?,
        })
    }

    /// Parse the complete attribute text into one expression
    pub fn parse(&mut self) -> ParseResult<Expr> {
        if self.cursor.is_empty() {
            return Err(ParseError::Empty { what: "expression" });
        }

        let expr = self.parse_or()?;

        if !self.cursor.is_at_end() {
            return Err(self.cursor.error_here("end of expression"));
        }

        Ok(expr)
    }

    /// Parse OR expression (lowest precedence)
    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;

        while self.cursor.match_token(&Token::Or) || self.cursor.match_token(&Token::OrKw) {
            let right = self.parse_and()?;
            let span = left.span().to(right.span());
            left = Expr::Or {
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Parse AND expression
    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while self.cursor.match_token(&Token::And) || self.cursor.match_token(&Token::AndKw) {
            let right = self.parse_unary()?;
            let span = left.span().to(right.span());
            left = Expr::And {
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.cursor.peek_span();
        if self.cursor.match_token(&Token::Bang) || self.cursor.match_token(&Token::NotKw) {
            let operand = self.parse_unary()?;
            let span = start.to(operand.span());
            return Ok(Expr::Not {
                operand: Box::new(operand),
                span,
            });
        }

        self.parse_comparison()
    }

    /// Parse comparison and membership (`==`, `<`, `in`, ...)
    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_primary()?;

        loop {
            if self.cursor.match_token(&Token::In) {
                let haystack = self.parse_primary()?;
                let span = left.span().to(haystack.span());
                left = Expr::In {
                    needle: Box::new(left),
                    haystack: Box::new(haystack),
                    span,
                };
                continue;
            }

            let Some(operator) = self.match_compare_op() else {
                break;
            };
            let right = self.parse_primary()?;
            let span = left.span().to(right.span());
            left = Expr::Compare {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn match_compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.cursor.peek()? {
            Token::EqEq => CompareOp::Equals,
            Token::NotEq => CompareOp::NotEquals,
            Token::Lt => CompareOp::LessThan,
            Token::Lte => CompareOp::LessThanOrEqual,
            Token::Gt => CompareOp::GreaterThan,
            Token::Gte => CompareOp::GreaterThanOrEqual,
            _ => return None,
        };
        self.cursor.advance();
        Some(op)
    }

    /// Parse primary expression (literals, paths, lists, groups)
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let Some(next) = self.cursor.advance() else {
            return Err(ParseError::unexpected_eof("expression"));
        };
        let span = next.span;

        match next.token {
            Token::True => Ok(Expr::Literal {
                value: Literal::Boolean(true),
                span,
            }),
            Token::False => Ok(Expr::Literal {
                value: Literal::Boolean(false),
                span,
            }),
            Token::Null => Ok(Expr::Literal {
                value: Literal::Null,
                span,
            }),
            Token::Number(n) => {
                let value = n
                    .parse::<f64>()
                    .map_err(|_| ParseError::invalid_syntax(span, format!("invalid number {}", n)))?;
                Ok(Expr::Literal {
                    value: Literal::Number(value),
                    span,
                })
            }
            Token::String(s) | Token::SingleQuoteString(s) => Ok(Expr::Literal {
                value: Literal::String(unescape(s)),
                span,
            }),
            Token::Ident(first) => self.parse_path(first.to_string(), span),
            Token::LParen => {
                let expr = self.parse_or()?;
                self.cursor.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => self.parse_list(span),
            other => Err(ParseError::unexpected_token(
                span,
                "expression",
                other.describe(),
            )),
        }
    }

    /// Parse dotted field path: `form.field` or `field`
    fn parse_path(&mut self, first: String, start: crate::lexer::TokenSpan) -> ParseResult<Expr> {
        let mut segments = vec![first];

        while self.cursor.match_token(&Token::Dot) {
            match self.cursor.advance() {
                Some(t) => match t.token {
                    Token::Ident(name) => segments.push(name.to_string()),
                    other => {
                        return Err(ParseError::unexpected_token(
                            t.span,
                            "field name after '.'",
                            other.describe(),
                        ))
                    }
                },
                None => return Err(ParseError::unexpected_eof("field name after '.'")),
            }
        }

        Ok(Expr::Path(PathRef {
            segments,
            span: start.to(self.cursor.previous_span()),
        }))
    }

    fn parse_list(&mut self, start: crate::lexer::TokenSpan) -> ParseResult<Expr> {
        let mut items = Vec::new();

        while !self.cursor.check(&Token::RBracket) && !self.cursor.is_at_end() {
            items.push(self.parse_or()?);

            if !self.cursor.match_token(&Token::Comma) {
                break;
            }
        }

        let end = self.cursor.expect(&Token::RBracket)?;

        Ok(Expr::List {
            items,
            span: start.to(end),
        })
    }
}

/// Parse one condition expression
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    ExpressionParser::new(source)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_path() {
        let expr = parse_expression("register.enable").unwrap();
        match expr {
            Expr::Path(path) => assert_eq!(path.segments, vec!["register", "enable"]),
            other => panic!("Expected path, got {:?}", other),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse_expression("a || b && c").unwrap();
        match expr {
            Expr::Or { right, .. } => assert!(matches!(*right, Expr::And { .. })),
            other => panic!("Expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_not_wraps_membership() {
        let expr = parse_expression("not kind in ['a', 'b']").unwrap();
        match expr {
            Expr::Not { operand, .. } => assert!(matches!(*operand, Expr::In { .. })),
            other => panic!("Expected not, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse_expression("a == 1 2").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_empty_expression_rejected() {
        assert_eq!(
            parse_expression("   ").unwrap_err(),
            ParseError::Empty { what: "expression" }
        );
    }

    #[test]
    fn test_unclosed_group() {
        let err = parse_expression("(a && b").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }
}

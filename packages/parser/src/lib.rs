//! # Formset Parser
//!
//! Parses the two small languages that markup attaches to a formset:
//!
//! - condition expressions from `show-if`, `hide-if` and `disable-if`
//!   (`contact.kind == 'phone' && !contact.unlisted`)
//! - action chains from submit-like controls
//!   (`disable -> submit -> proceed !~ scrollToError`)
//!
//! Both grammars share one logos lexer and are parsed by hand-written
//! recursive descent. Every attribute is parsed exactly once, when the
//! formset initializes.

pub mod actions;
pub mod ast;
mod cursor;
pub mod error;
pub mod expression;
pub mod lexer;

#[cfg(test)]
mod tests_comprehensive;

pub use actions::{parse_action_chain, ChainParser};
pub use ast::{
    ActionChain, Command, CompareOp, Expr, Guard, GuardKind, Literal, PathRef, Step,
};
pub use error::{format_error, ParseError, ParseResult};
pub use expression::{parse_expression, ExpressionParser};
pub use lexer::{lex, Token, TokenSpan};

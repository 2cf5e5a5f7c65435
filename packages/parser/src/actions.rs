//! Parser for the action-chain DSL attached to submit-like controls
//!
//! ```text
//! chain := step ("->" step)*
//! step  := call (("~" | "!~") call)?
//! call  := ident ("(" (arg ("," arg)*)? ")")?
//! arg   := string | number
//! ```
//!
//! Command names and arities are checked here, so a control with a broken
//! chain is rejected when the formset initializes, not when it is clicked.

use crate::ast::{ActionChain, Command, Guard, GuardKind, Step};
use crate::cursor::{unescape, TokenCursor};
use crate::error::{ParseError, ParseResult};
use crate::lexer::{Token, TokenSpan};

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Num(f64),
}

impl Arg {
    fn describe(&self) -> &'static str {
        match self {
            Arg::Str(_) => "string",
            Arg::Num(_) => "number",
        }
    }
}

pub struct ChainParser<'src> {
    cursor: TokenCursor<'src>,
}

impl<'src> ChainParser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        Ok(Self {
            cursor: TokenCursor::new(source)?,
        })
    }

    pub fn parse(&mut self) -> ParseResult<ActionChain> {
        if self.cursor.is_empty() {
            return Err(ParseError::Empty {
                what: "action chain",
            });
        }

        let mut steps = vec![self.parse_step()?];
        while self.cursor.match_token(&Token::Arrow) {
            steps.push(self.parse_step()?);
        }

        if !self.cursor.is_at_end() {
            return Err(self.cursor.error_here("'->' or end of chain"));
        }

        Ok(ActionChain { steps })
    }

    fn parse_step(&mut self) -> ParseResult<Step> {
        let (command, span) = self.parse_call()?;

        let kind = if self.cursor.match_token(&Token::Tilde) {
            Some(GuardKind::OnSuccess)
        } else if self.cursor.match_token(&Token::BangTilde) {
            Some(GuardKind::OnFailure)
        } else {
            None
        };

        match kind {
            None => Ok(Step::Command { command, span }),
            Some(kind) => {
                let (proceeding, guard_span) = self.parse_call()?;
                Ok(Step::GuardedProceeding {
                    command,
                    guard: Guard {
                        kind,
                        proceeding,
                        span: guard_span,
                    },
                    span: span.to(guard_span),
                })
            }
        }
    }

    fn parse_call(&mut self) -> ParseResult<(Command, TokenSpan)> {
        let Some(next) = self.cursor.advance() else {
            return Err(ParseError::unexpected_eof("command"));
        };
        let name = match next.token {
            Token::Ident(name) => name,
            other => {
                return Err(ParseError::unexpected_token(
                    next.span,
                    "command",
                    other.describe(),
                ))
            }
        };

        let mut args = Vec::new();
        if self.cursor.match_token(&Token::LParen) {
            while !self.cursor.check(&Token::RParen) && !self.cursor.is_at_end() {
                args.push(self.parse_arg()?);
                if !self.cursor.match_token(&Token::Comma) {
                    break;
                }
            }
            self.cursor.expect(&Token::RParen)?;
        }

        let span = next.span.to(self.cursor.previous_span());
        let command = build_command(name, args, span)?;
        Ok((command, span))
    }

    fn parse_arg(&mut self) -> ParseResult<Arg> {
        let Some(next) = self.cursor.advance() else {
            return Err(ParseError::unexpected_eof("argument"));
        };
        match next.token {
            Token::String(s) | Token::SingleQuoteString(s) => Ok(Arg::Str(unescape(s))),
            Token::Number(n) => n
                .parse::<f64>()
                .map(Arg::Num)
                .map_err(|_| ParseError::invalid_syntax(next.span, format!("invalid number {}", n))),
            other => Err(ParseError::unexpected_token(
                next.span,
                "string or number argument",
                other.describe(),
            )),
        }
    }
}

fn no_args(name: &str, args: &[Arg], span: TokenSpan) -> ParseResult<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ParseError::invalid_arguments(span, name, "takes no arguments"))
    }
}

fn one_string(name: &str, args: Vec<Arg>, span: TokenSpan) -> ParseResult<String> {
    match args.as_slice() {
        [Arg::Str(s)] => Ok(s.clone()),
        [other] => Err(ParseError::invalid_arguments(
            span,
            name,
            format!("expects a string, got a {}", other.describe()),
        )),
        _ => Err(ParseError::invalid_arguments(
            span,
            name,
            "expects exactly one string argument",
        )),
    }
}

fn non_negative_integer(name: &str, value: f64, span: TokenSpan) -> ParseResult<u64> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(ParseError::invalid_arguments(
            span,
            name,
            format!("expects a non-negative integer, got {}", value),
        ));
    }
    Ok(value as u64)
}

/// Map a parsed call onto the command vocabulary
fn build_command(name: &str, args: Vec<Arg>, span: TokenSpan) -> ParseResult<Command> {
    let command = match name {
        "disable" => no_args(name, &args, span).map(|_| Command::Disable)?,
        "enable" => no_args(name, &args, span).map(|_| Command::Enable)?,
        "submit" => no_args(name, &args, span).map(|_| Command::Submit)?,
        "validate" => no_args(name, &args, span).map(|_| Command::Validate)?,
        "reset" => no_args(name, &args, span).map(|_| Command::Reset)?,
        "clearErrors" => no_args(name, &args, span).map(|_| Command::ClearErrors)?,
        "reload" => no_args(name, &args, span).map(|_| Command::Reload)?,
        "spinner" => no_args(name, &args, span).map(|_| Command::Spinner)?,
        "okay" => no_args(name, &args, span).map(|_| Command::Okay)?,
        "bummer" => no_args(name, &args, span).map(|_| Command::Bummer)?,
        "scrollToError" => no_args(name, &args, span).map(|_| Command::ScrollToError)?,
        "proceed" => {
            if args.is_empty() {
                Command::Proceed(None)
            } else {
                Command::Proceed(Some(one_string(name, args, span)?))
            }
        }
        "delay" => match args.as_slice() {
            [Arg::Num(ms)] => Command::Delay(non_negative_integer(name, *ms, span)?),
            _ => {
                return Err(ParseError::invalid_arguments(
                    span,
                    name,
                    "expects a duration in milliseconds",
                ))
            }
        },
        "emit" => Command::Emit(one_string(name, args, span)?),
        "awaitUpload" => Command::AwaitUpload(one_string(name, args, span)?),
        "addInstance" => Command::AddInstance(one_string(name, args, span)?),
        "removeInstance" => match args.as_slice() {
            [Arg::Str(path), Arg::Num(index)] => {
                let index = non_negative_integer(name, *index, span)? as usize;
                Command::RemoveInstance(path.clone(), index)
            }
            _ => {
                return Err(ParseError::invalid_arguments(
                    span,
                    name,
                    "expects a collection path and an instance index",
                ))
            }
        },
        _ => {
            return Err(ParseError::UnknownCommand {
                span,
                name: name.to_string(),
            })
        }
    };

    Ok(command)
}

/// Parse the action text of one control
pub fn parse_action_chain(source: &str) -> ParseResult<ActionChain> {
    ChainParser::new(source)?.parse()
}

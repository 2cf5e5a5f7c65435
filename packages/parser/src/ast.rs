use crate::lexer::TokenSpan;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Condition expressions (show-if / hide-if / disable-if)
// ---------------------------------------------------------------------------

/// Reference to a field by its dotted name, e.g. `contact.kind`.
///
/// References never carry instance indices; the runtime resolves them
/// against the scope of the element that declares the condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathRef {
    pub segments: Vec<String>,
    pub span: TokenSpan,
}

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Equals => "==",
            CompareOp::NotEquals => "!=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqual => "<=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEqual => ">=",
        };
        f.write_str(op)
    }
}

/// Boolean expression AST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal {
        value: Literal,
        span: TokenSpan,
    },

    /// Field value lookup
    Path(PathRef),

    /// List literal, only meaningful as the right side of `in`
    List {
        items: Vec<Expr>,
        span: TokenSpan,
    },

    Not {
        operand: Box<Expr>,
        span: TokenSpan,
    },

    And {
        left: Box<Expr>,
        right: Box<Expr>,
        span: TokenSpan,
    },

    Or {
        left: Box<Expr>,
        right: Box<Expr>,
        span: TokenSpan,
    },

    Compare {
        left: Box<Expr>,
        operator: CompareOp,
        right: Box<Expr>,
        span: TokenSpan,
    },

    /// Set membership: `needle in haystack`
    In {
        needle: Box<Expr>,
        haystack: Box<Expr>,
        span: TokenSpan,
    },
}

impl Expr {
    pub fn span(&self) -> TokenSpan {
        match self {
            Expr::Path(path) => path.span,
            Expr::Literal { span, .. }
            | Expr::List { span, .. }
            | Expr::Not { span, .. }
            | Expr::And { span, .. }
            | Expr::Or { span, .. }
            | Expr::Compare { span, .. }
            | Expr::In { span, .. } => *span,
        }
    }

    /// Collect every field reference in evaluation order, duplicates included
    pub fn references(&self) -> Vec<&PathRef> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a PathRef>) {
        match self {
            Expr::Literal { .. } => {}
            Expr::Path(path) => out.push(path),
            Expr::List { items, .. } => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Expr::Not { operand, .. } => operand.collect_references(out),
            Expr::And { left, right, .. }
            | Expr::Or { left, right, .. }
            | Expr::Compare { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            Expr::In {
                needle, haystack, ..
            } => {
                needle.collect_references(out);
                haystack.collect_references(out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Action chains
// ---------------------------------------------------------------------------

/// A command understood by the chain interpreter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Disable,
    Enable,
    Submit,
    Validate,
    Reset,
    ClearErrors,
    Proceed(Option<String>),
    Reload,
    Delay(u64),
    Spinner,
    Okay,
    Bummer,
    ScrollToError,
    Emit(String),
    AwaitUpload(String),
    AddInstance(String),
    RemoveInstance(String, usize),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Disable => "disable",
            Command::Enable => "enable",
            Command::Submit => "submit",
            Command::Validate => "validate",
            Command::Reset => "reset",
            Command::ClearErrors => "clearErrors",
            Command::Proceed(_) => "proceed",
            Command::Reload => "reload",
            Command::Delay(_) => "delay",
            Command::Spinner => "spinner",
            Command::Okay => "okay",
            Command::Bummer => "bummer",
            Command::ScrollToError => "scrollToError",
            Command::Emit(_) => "emit",
            Command::AwaitUpload(_) => "awaitUpload",
            Command::AddInstance(_) => "addInstance",
            Command::RemoveInstance(..) => "removeInstance",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Proceed(Some(url)) => write!(f, "proceed({:?})", url),
            Command::Delay(ms) => write!(f, "delay({})", ms),
            Command::Emit(event) => write!(f, "emit({:?})", event),
            Command::AwaitUpload(path) => write!(f, "awaitUpload({:?})", path),
            Command::AddInstance(path) => write!(f, "addInstance({:?})", path),
            Command::RemoveInstance(path, index) => {
                write!(f, "removeInstance({:?}, {})", path, index)
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Which prior outcome triggers a guarded proceeding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardKind {
    /// `~`
    OnSuccess,
    /// `!~`
    OnFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub kind: GuardKind,
    pub proceeding: Command,
    pub span: TokenSpan,
}

/// One instruction of a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    Command {
        command: Command,
        span: TokenSpan,
    },
    GuardedProceeding {
        command: Command,
        guard: Guard,
        span: TokenSpan,
    },
}

impl Step {
    pub fn command(&self) -> &Command {
        match self {
            Step::Command { command, .. } | Step::GuardedProceeding { command, .. } => command,
        }
    }

    pub fn guard(&self) -> Option<&Guard> {
        match self {
            Step::Command { .. } => None,
            Step::GuardedProceeding { guard, .. } => Some(guard),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Command { command, .. } => write!(f, "{}", command),
            Step::GuardedProceeding { command, guard, .. } => {
                let op = match guard.kind {
                    GuardKind::OnSuccess => "~",
                    GuardKind::OnFailure => "!~",
                };
                write!(f, "{} {} {}", command, op, guard.proceeding)
            }
        }
    }
}

/// Parsed action chain attached to a control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionChain {
    pub steps: Vec<Step>,
}

impl ActionChain {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for ActionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

//! Condition expression evaluation
//!
//! Evaluation is a pure function of the values a [`Scope`] hands out. It
//! never fails: unknown or hidden references come back as
//! [`Value::Absent`], which compares false and contains nothing.

use crate::value::Value;
use formset_parser::{Expr, PathRef};

/// Supplies field values for the references of one condition
pub trait Scope {
    fn value_of(&self, reference: &PathRef) -> Value;
}

pub fn evaluate(expr: &Expr, scope: &impl Scope) -> Value {
    match expr {
        Expr::Literal { value, .. } => Value::from_literal(value),

        Expr::Path(reference) => scope.value_of(reference),

        Expr::List { items, .. } => {
            Value::List(items.iter().map(|item| evaluate(item, scope)).collect())
        }

        Expr::Not { operand, .. } => Value::Boolean(!evaluate(operand, scope).is_truthy()),

        Expr::And { left, right, .. } => {
            let result = evaluate(left, scope).is_truthy() && evaluate(right, scope).is_truthy();
            Value::Boolean(result)
        }

        Expr::Or { left, right, .. } => {
            let result = evaluate(left, scope).is_truthy() || evaluate(right, scope).is_truthy();
            Value::Boolean(result)
        }

        Expr::Compare {
            left,
            operator,
            right,
            ..
        } => {
            let left = evaluate(left, scope);
            let right = evaluate(right, scope);
            Value::Boolean(left.compare(*operator, &right))
        }

        Expr::In {
            needle, haystack, ..
        } => {
            let needle = evaluate(needle, scope);
            let haystack = evaluate(haystack, scope);
            Value::Boolean(haystack.contains(&needle))
        }
    }
}

pub fn evaluate_condition(expr: &Expr, scope: &impl Scope) -> bool {
    evaluate(expr, scope).is_truthy()
}

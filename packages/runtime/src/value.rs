//! Values as seen by condition expressions

use formset_parser::{CompareOp, Literal};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The referenced field does not exist or is hidden
    Absent,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            // file handles and other structured payloads only count as "present"
            JsonValue::Object(map) => Value::Boolean(!map.is_empty()),
        }
    }

    pub fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(s.clone()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Absent | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Equality with numeric coercion of strings; `None` if either side is absent
    fn loose_eq(&self, other: &Value) -> Option<bool> {
        let equal = match (self, other) {
            (Value::Absent, _) | (_, Value::Absent) => return None,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) if a == b => true,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.loose_eq(y).unwrap_or(false))
            }
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        };
        Some(equal)
    }

    fn ordering(&self, other: &Value) -> Option<Ordering> {
        if let (Some(x), Some(y)) = (self.as_number(), other.as_number()) {
            return x.partial_cmp(&y);
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Comparisons involving an absent value are always false
    pub fn compare(&self, operator: CompareOp, other: &Value) -> bool {
        if self.is_absent() || other.is_absent() {
            return false;
        }
        match operator {
            CompareOp::Equals => self.loose_eq(other).unwrap_or(false),
            CompareOp::NotEquals => !self.loose_eq(other).unwrap_or(true),
            CompareOp::LessThan => self.ordering(other) == Some(Ordering::Less),
            CompareOp::LessThanOrEqual => {
                matches!(self.ordering(other), Some(Ordering::Less | Ordering::Equal))
            }
            CompareOp::GreaterThan => self.ordering(other) == Some(Ordering::Greater),
            CompareOp::GreaterThanOrEqual => {
                matches!(self.ordering(other), Some(Ordering::Greater | Ordering::Equal))
            }
        }
    }

    /// Membership of `needle` in `self`; absent haystacks are empty
    pub fn contains(&self, needle: &Value) -> bool {
        if needle.is_absent() {
            return false;
        }
        match self {
            Value::List(items) => items.iter().any(|item| item.loose_eq(needle) == Some(true)),
            Value::String(haystack) => match needle {
                Value::String(n) => haystack.contains(n.as_str()),
                _ => false,
            },
            _ => false,
        }
    }
}

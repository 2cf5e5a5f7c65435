//! Field nodes and their client-side state

use crate::path::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

pub const REQUIRED_MESSAGE: &str = "This field is required.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    #[default]
    Text,
    Number,
    Checkbox,
    Select,
    SelectMultiple,
    File,
}

impl InputKind {
    /// Value of a freshly added instance's field
    pub fn zero_value(&self) -> JsonValue {
        match self {
            InputKind::Text | InputKind::Select => json!(""),
            InputKind::Number => JsonValue::Null,
            InputKind::Checkbox => json!(false),
            InputKind::SelectMultiple | InputKind::File => json!([]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reasons", rename_all = "camelCase")]
pub enum Validity {
    Unvalidated,
    Valid,
    Invalid(Vec<String>),
}

impl Validity {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Validity::Invalid(_))
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Validity::Invalid(reasons) => reasons,
            _ => &[],
        }
    }
}

/// Where an invalid verdict came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorSource {
    Client,
    Server,
    Upload,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        *self == Visibility::Visible
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Enablement {
    #[default]
    Enabled,
    Disabled,
}

impl Enablement {
    pub fn is_enabled(&self) -> bool {
        *self == Enablement::Enabled
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        !self.required && self.min_length.is_none() && self.max_length.is_none()
    }

    /// Client-side verdict for `value`; `Valid` when nothing is violated
    pub fn check(&self, input: InputKind, value: &JsonValue) -> Validity {
        let mut reasons = Vec::new();

        if self.required && is_blank(input, value) {
            reasons.push(REQUIRED_MESSAGE.to_string());
            return Validity::Invalid(reasons);
        }

        if let JsonValue::String(text) = value {
            let length = text.chars().count();
            if let Some(min) = self.min_length {
                if length > 0 && length < min {
                    reasons.push(format!(
                        "Ensure this value has at least {} characters (it has {}).",
                        min, length
                    ));
                }
            }
            if let Some(max) = self.max_length {
                if length > max {
                    reasons.push(format!(
                        "Ensure this value has at most {} characters (it has {}).",
                        max, length
                    ));
                }
            }
        }

        if reasons.is_empty() {
            Validity::Valid
        } else {
            Validity::Invalid(reasons)
        }
    }
}

fn is_blank(input: InputKind, value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Bool(b) => input == InputKind::Checkbox && !b,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldNode {
    pub(crate) path: FieldPath,
    pub(crate) input: InputKind,
    pub(crate) value: JsonValue,
    pub(crate) validity: Validity,
    #[serde(skip)]
    pub(crate) error_source: Option<ErrorSource>,
    pub(crate) visibility: Visibility,
    pub(crate) enablement: Enablement,
    pub(crate) dirty: bool,
    #[serde(skip)]
    pub(crate) constraints: Constraints,
}

impl FieldNode {
    pub fn new(path: FieldPath, input: InputKind, value: JsonValue, constraints: Constraints) -> Self {
        Self {
            path,
            input,
            value,
            validity: Validity::Unvalidated,
            error_source: None,
            visibility: Visibility::Visible,
            enablement: Enablement::Enabled,
            dirty: false,
            constraints,
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn input(&self) -> InputKind {
        self.input
    }

    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn error_source(&self) -> Option<ErrorSource> {
        self.error_source
    }

    /// Own visibility; an enclosing collection may still hide the field
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn enablement(&self) -> Enablement {
        self.enablement
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub(crate) fn mark_invalid(&mut self, reasons: Vec<String>, source: ErrorSource) {
        self.validity = Validity::Invalid(reasons);
        self.error_source = Some(source);
    }

    /// Drop a displayed error; the value stays untouched
    pub(crate) fn clear_error(&mut self) {
        if self.validity.is_invalid() {
            self.validity = Validity::Unvalidated;
            self.error_source = None;
        }
    }
}

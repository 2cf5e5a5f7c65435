//! Declarative formset description
//!
//! The host renders markup and hands the runtime a JSON description of what
//! it rendered: the form tree with its conditions, collection cardinalities,
//! initial data and the controls with their action text.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "kind": "collection", "name": "customer", "children": [
//!       { "kind": "field", "name": "name", "required": true },
//!       { "kind": "field", "name": "vip", "input": "checkbox" }
//!     ]},
//!     { "kind": "collection", "name": "contacts",
//!       "cardinality": { "policy": "repeatable", "min": 1, "max": 3 },
//!       "showIf": "customer.vip",
//!       "children": [ { "kind": "field", "name": "phone" } ] }
//!   ],
//!   "controls": [ { "name": "save", "actions": "disable -> submit -> proceed !~ enable" } ]
//! }
//! ```

use crate::error::{FormsetError, FormsetResult};
use crate::field::InputKind;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Chain used by controls that declare no action text
pub const DEFAULT_ACTIONS: &str = "disable -> submit -> proceed !~ enable";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormsetSchema {
    #[serde(default)]
    pub nodes: Vec<NodeSchema>,

    #[serde(default)]
    pub controls: Vec<ControlSchema>,
}

impl FormsetSchema {
    pub fn from_json(source: &str) -> FormsetResult<Self> {
        serde_json::from_str(source).map_err(|e| FormsetError::InvalidSchema(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeSchema {
    Field(FieldSchema),
    Collection(CollectionSchema),
}

impl NodeSchema {
    pub fn name(&self) -> &str {
        match self {
            NodeSchema::Field(field) => &field.name,
            NodeSchema::Collection(collection) => &collection.name,
        }
    }

    pub fn conditions(&self) -> &ConditionSchema {
        match self {
            NodeSchema::Field(field) => &field.conditions,
            NodeSchema::Collection(collection) => &collection.conditions,
        }
    }
}

/// The three conditional attributes a node may carry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_if: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_if: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,

    #[serde(default)]
    pub input: InputKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<JsonValue>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(flatten)]
    pub conditions: ConditionSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    pub name: String,

    #[serde(default)]
    pub cardinality: Cardinality,

    #[serde(default)]
    pub children: Vec<NodeSchema>,

    /// Initial data of a repeatable collection, one object per instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial: Vec<JsonValue>,

    #[serde(flatten)]
    pub conditions: ConditionSchema,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "camelCase")]
pub enum Cardinality {
    #[default]
    Singleton,
    Repeatable {
        #[serde(default)]
        min: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
}

impl Cardinality {
    /// (min, max) instance counts
    pub fn bounds(&self) -> (usize, Option<usize>) {
        match self {
            Cardinality::Singleton => (1, Some(1)),
            Cardinality::Repeatable { min, max } => (*min, *max),
        }
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self, Cardinality::Repeatable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSchema {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<String>,
}

impl ControlSchema {
    pub fn action_text(&self) -> &str {
        self.actions.as_deref().unwrap_or(DEFAULT_ACTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_documented_example() {
        let schema = FormsetSchema::from_json(
            r#"{
              "nodes": [
                { "kind": "collection", "name": "customer", "children": [
                  { "kind": "field", "name": "name", "required": true },
                  { "kind": "field", "name": "vip", "input": "checkbox" }
                ]},
                { "kind": "collection", "name": "contacts",
                  "cardinality": { "policy": "repeatable", "min": 1, "max": 3 },
                  "showIf": "customer.vip",
                  "children": [ { "kind": "field", "name": "phone" } ] }
              ],
              "controls": [ { "name": "save" } ]
            }"#,
        )
        .unwrap();

        assert_eq!(schema.nodes.len(), 2);
        match &schema.nodes[1] {
            NodeSchema::Collection(c) => {
                assert_eq!(c.cardinality.bounds(), (1, Some(3)));
                assert_eq!(c.conditions.show_if.as_deref(), Some("customer.vip"));
            }
            other => panic!("Expected collection, got {:?}", other),
        }
        assert_eq!(schema.controls[0].action_text(), DEFAULT_ACTIONS);
    }

    #[test]
    fn test_field_defaults() {
        let node: NodeSchema = serde_json::from_str(r#"{"kind": "field", "name": "x"}"#).unwrap();
        match node {
            NodeSchema::Field(f) => {
                assert_eq!(f.input, InputKind::Text);
                assert!(!f.required);
                assert_eq!(f.conditions, ConditionSchema::default());
            }
            other => panic!("Expected field, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_schema_error() {
        let err = FormsetSchema::from_json(r#"{"nodes": [{"kind": "widget", "name": "x"}]}"#)
            .unwrap_err();
        assert!(matches!(err, FormsetError::InvalidSchema(_)));
    }
}

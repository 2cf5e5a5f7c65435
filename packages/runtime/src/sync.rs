//! Submission payloads and server response mapping
//!
//! Request body:
//!
//! ```json
//! {"formset_data": {"customer": {"name": "Ada"}, "contacts": [{"phone": "1"}, {"phone": "2"}]}}
//! ```
//!
//! A rejected submission comes back as the same shape with lists of reasons
//! at the leaves; repeatable collections are positional arrays. Positions
//! are mapped back through the instance keys recorded when the payload was
//! built, so removing an instance while the request is in flight cannot
//! shift errors onto the wrong sibling.

use crate::formset::FormState;
use crate::path::{FieldPath, InstanceKey};
use crate::template::{CollectionTemplate, TemplateNode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};

/// Keys holding reasons that belong to no single field
pub const NON_FIELD_KEYS: [&str; 2] = ["__all__", "non_field_errors"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum SubmitResponse {
    /// HTTP 200
    Accepted {
        #[serde(default)]
        success_url: Option<String>,
    },
    /// HTTP 422 with the nested error object
    Rejected { errors: JsonValue },
}

/// Instance order of every repeatable collection at serialization time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionSnapshot {
    instances: HashMap<FieldPath, Vec<InstanceKey>>,
}

impl SubmissionSnapshot {
    pub fn instance_at(&self, collection: &FieldPath, position: usize) -> Option<InstanceKey> {
        self.instances
            .get(collection)
            .and_then(|keys| keys.get(position).copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub control: Option<String>,
    pub body: JsonValue,
    pub(crate) snapshot: SubmissionSnapshot,
}

impl SubmitRequest {
    pub fn body(&self) -> &JsonValue {
        &self.body
    }
}

/// Server verdict mapped onto live paths
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorReport {
    pub field_errors: BTreeMap<FieldPath, Vec<String>>,
    pub non_field_errors: Vec<String>,
}

pub(crate) fn build_request(state: &FormState, control: Option<&str>) -> SubmitRequest {
    let mut snapshot = SubmissionSnapshot::default();
    let payload = collect_level(state, &state.root.children, &FieldPath::root(), &mut snapshot);
    SubmitRequest {
        control: control.map(str::to_string),
        body: json!({ "formset_data": payload }),
        snapshot,
    }
}

pub(crate) fn build_payload(state: &FormState) -> JsonValue {
    let mut snapshot = SubmissionSnapshot::default();
    JsonValue::Object(collect_level(
        state,
        &state.root.children,
        &FieldPath::root(),
        &mut snapshot,
    ))
}

fn collect_level(
    state: &FormState,
    children: &[TemplateNode],
    prefix: &FieldPath,
    snapshot: &mut SubmissionSnapshot,
) -> Map<String, JsonValue> {
    let mut map = Map::new();

    for child in children {
        match child {
            TemplateNode::Field(template) => {
                let path = prefix.child(&template.name);
                let Some(node) = state.fields.get(&path) else {
                    continue;
                };
                if node.visibility.is_visible() && node.enablement.is_enabled() {
                    map.insert(template.name.clone(), node.value.clone());
                }
            }
            TemplateNode::Collection(template) => {
                let path = prefix.child(&template.name);
                let Some(node) = state.collections.get(&path) else {
                    continue;
                };
                if !(node.visibility.is_visible() && node.enablement.is_enabled()) {
                    continue;
                }
                map.insert(
                    template.name.clone(),
                    collect_collection(state, template, &path, snapshot),
                );
            }
        }
    }

    map
}

fn collect_collection(
    state: &FormState,
    template: &CollectionTemplate,
    path: &FieldPath,
    snapshot: &mut SubmissionSnapshot,
) -> JsonValue {
    if !template.cardinality.is_repeatable() {
        return JsonValue::Object(collect_level(state, &template.children, path, snapshot));
    }

    let keys = state
        .collections
        .get(path)
        .map(|node| node.instances.clone())
        .unwrap_or_default();

    let items = keys
        .iter()
        .map(|key| {
            JsonValue::Object(collect_level(
                state,
                &template.children,
                &path.instance(*key),
                snapshot,
            ))
        })
        .collect();

    snapshot.instances.insert(path.clone(), keys);
    JsonValue::Array(items)
}

/// Map a nested error object onto current paths
pub(crate) fn map_errors(
    state: &FormState,
    snapshot: &SubmissionSnapshot,
    errors: &JsonValue,
) -> ErrorReport {
    let mut report = ErrorReport::default();
    walk_errors(state, snapshot, errors, &FieldPath::root(), &mut report);
    report
}

fn walk_errors(
    state: &FormState,
    snapshot: &SubmissionSnapshot,
    errors: &JsonValue,
    prefix: &FieldPath,
    report: &mut ErrorReport,
) {
    let JsonValue::Object(map) = errors else {
        unmatched(errors, prefix, report);
        return;
    };

    for (key, value) in map {
        if NON_FIELD_KEYS.contains(&key.as_str()) {
            unmatched(value, prefix, report);
            continue;
        }

        let path = prefix.child(key);
        if state.fields.contains(&path) {
            let reasons = reasons_of(value);
            if !reasons.is_empty() {
                report
                    .field_errors
                    .entry(path)
                    .or_default()
                    .extend(reasons);
            }
            continue;
        }

        match (state.collections.get(&path), value) {
            (Some(node), JsonValue::Array(items)) if node.is_repeatable() => {
                for (position, item) in items.iter().enumerate() {
                    let live = snapshot
                        .instance_at(&path, position)
                        .filter(|key| node.position_of(*key).is_some());
                    match live {
                        Some(key) => walk_errors(state, snapshot, item, &path.instance(key), report),
                        None => unmatched(item, &path, report),
                    }
                }
            }
            (Some(node), JsonValue::Object(_)) if !node.is_repeatable() => {
                walk_errors(state, snapshot, value, &path, report);
            }
            _ => unmatched(value, &path, report),
        }
    }
}

/// Flatten reasons into the non-field bucket, labelled with their path
fn unmatched(value: &JsonValue, label: &FieldPath, report: &mut ErrorReport) {
    let mut reasons = Vec::new();
    flatten_reasons(value, &mut reasons);
    for reason in reasons {
        if label.is_root() {
            report.non_field_errors.push(reason);
        } else {
            report.non_field_errors.push(format!("{}: {}", label, reason));
        }
    }
}

fn flatten_reasons(value: &JsonValue, out: &mut Vec<String>) {
    match value {
        JsonValue::String(reason) => out.push(reason.clone()),
        JsonValue::Array(items) => items.iter().for_each(|item| flatten_reasons(item, out)),
        JsonValue::Object(map) => map.values().for_each(|item| flatten_reasons(item, out)),
        _ => {}
    }
}

fn reasons_of(value: &JsonValue) -> Vec<String> {
    let mut reasons = Vec::new();
    flatten_reasons(value, &mut reasons);
    reasons
}

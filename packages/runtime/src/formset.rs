//! The formset: one submittable unit made of fields, collections and controls
//!
//! [`Formset`] owns all state and is driven entirely through method calls.
//! Every mutation settles synchronously before it returns: conditions
//! subscribed to a changed field are re-evaluated, visibility changes are
//! pushed to their own subscribers, and so on until nothing moves.

use crate::collection::{CollectionNode, CollectionTree};
use crate::dependency_index::{Binding, Condition, ConditionId, DependencyIndex};
use crate::error::{
    Diagnostic, FormsetError, FormsetResult, Problem, TransportError, UploadError,
};
use crate::evaluator::{evaluate_condition, Scope};
use crate::field::{Enablement, ErrorSource, FieldNode, InputKind, Validity, Visibility};
use crate::field_graph::FieldGraph;
use crate::interpreter::{
    ChainRunner, ChainState, CommandHost, Effect, EffectKind, Outcome, Progress, Resolution,
    StepResult, Suspension, Waiting,
};
use crate::path::{FieldPath, InstanceKey};
use crate::schema::{Cardinality, FormsetSchema};
use crate::sync::{self, SubmissionSnapshot, SubmitRequest, SubmitResponse};
use crate::template::{self, CollectionTemplate, CompiledCondition, TemplateNode};
use crate::upload::{
    FileHandle, FileSelection, HandleId, UploadHandle, UploadManager, UploadRequest, UploadStatus,
};
use crate::value::Value;
use formset_parser::{parse_action_chain, Command, PathRef};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// UI state of one control
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlStatus {
    pub disabled: bool,
    /// Last recoverable error reported to this control (capacity violations)
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionValidity {
    pub valid: bool,
    pub below_minimum: bool,
    pub instances: Vec<(InstanceKey, bool)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub invalid_fields: Vec<FieldPath>,
    pub collections: BTreeMap<FieldPath, CollectionValidity>,
}

/// Host-facing view of one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub path: String,
    pub value: JsonValue,
    pub validity: Validity,
    pub visible: bool,
    pub enabled: bool,
    pub dirty: bool,
}

/// Host-facing view of the whole formset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormsetView {
    pub fields: Vec<FieldView>,
    pub collections: BTreeMap<String, Vec<InstanceKey>>,
    pub non_field_errors: Vec<String>,
    pub controls: BTreeMap<String, ControlStatus>,
}

/// Everything a running chain may touch
#[derive(Debug)]
pub(crate) struct FormState {
    pub(crate) root: Arc<CollectionTemplate>,
    pub(crate) fields: FieldGraph,
    pub(crate) collections: CollectionTree,
    pub(crate) index: DependencyIndex,
    pub(crate) uploads: UploadManager,
    pub(crate) control_status: BTreeMap<String, ControlStatus>,
    pub(crate) pending_submissions: HashMap<String, SubmissionSnapshot>,
    pub(crate) non_field_errors: Vec<String>,
    pub(crate) success_url: Option<String>,
    pub(crate) effects: Vec<Effect>,
    pub(crate) evaluations: u64,
}

#[derive(Debug)]
struct Control {
    runner: Option<ChainRunner>,
    unavailable: Option<String>,
}

#[derive(Debug)]
pub struct Formset {
    state: FormState,
    controls: BTreeMap<String, Control>,
    diagnostics: Vec<Diagnostic>,
}

/// Innermost enclosing scope that has a field at `segments` wins
fn resolve_reference(fields: &FieldGraph, owner: &FieldPath, segments: &[String]) -> Binding {
    let mut innermost = None;
    for scope in owner.ancestors() {
        let candidate = scope.join_names(segments);
        if fields.contains(&candidate) {
            return Binding {
                path: candidate,
                resolved: true,
            };
        }
        innermost.get_or_insert(candidate);
    }
    Binding {
        path: innermost.unwrap_or_else(|| FieldPath::root().join_names(segments)),
        resolved: false,
    }
}

struct BoundScope<'a> {
    state: &'a FormState,
    condition: &'a Condition,
}

impl Scope for BoundScope<'_> {
    fn value_of(&self, reference: &PathRef) -> Value {
        let Some(binding) = self.condition.bindings.get(&reference.segments) else {
            return Value::Absent;
        };
        if !binding.resolved {
            return Value::Absent;
        }
        match self.state.fields.get(&binding.path) {
            Some(node) if self.state.effective(&binding.path).0 => Value::from_json(&node.value),
            _ => Value::Absent,
        }
    }
}

impl FormState {
    fn new(root: Arc<CollectionTemplate>) -> Self {
        Self {
            root,
            fields: FieldGraph::new(),
            collections: CollectionTree::new(),
            index: DependencyIndex::new(),
            uploads: UploadManager::new(),
            control_status: BTreeMap::new(),
            pending_submissions: HashMap::new(),
            non_field_errors: Vec::new(),
            success_url: None,
            effects: Vec::new(),
            evaluations: 0,
        }
    }

    /// Build the tree from initial data and settle every condition
    fn populate(&mut self) {
        let root = Arc::clone(&self.root);
        let mut owners = Vec::new();
        self.instantiate(&root.children, &FieldPath::root(), None, false, &mut owners);
        let ids = self.bind_owners(owners);
        self.settle(ids);
    }

    fn instantiate(
        &mut self,
        children: &[TemplateNode],
        prefix: &FieldPath,
        data: Option<&Map<String, JsonValue>>,
        fresh: bool,
        owners: &mut Vec<(FieldPath, Vec<CompiledCondition>)>,
    ) {
        for child in children {
            match child {
                TemplateNode::Field(template) => {
                    let path = prefix.child(&template.name);
                    let value = if fresh {
                        template.input.zero_value()
                    } else {
                        data.and_then(|d| d.get(&template.name))
                            .cloned()
                            .or_else(|| template.initial.clone())
                            .unwrap_or_else(|| template.input.zero_value())
                    };
                    self.fields.insert(FieldNode::new(
                        path.clone(),
                        template.input,
                        value,
                        template.constraints.clone(),
                    ));
                    if !template.conditions.is_empty() {
                        owners.push((path, template.conditions.clone()));
                    }
                }
                TemplateNode::Collection(template) => {
                    let path = prefix.child(&template.name);
                    let nested = data.and_then(|d| d.get(&template.name));
                    let mut node = CollectionNode::new(path.clone(), Arc::clone(template));
                    if !template.conditions.is_empty() {
                        owners.push((path.clone(), template.conditions.clone()));
                    }

                    match template.cardinality {
                        Cardinality::Singleton => {
                            self.collections.insert(node);
                            let nested = nested.and_then(|v| v.as_object());
                            self.instantiate(&template.children, &path, nested, fresh, owners);
                        }
                        Cardinality::Repeatable { min, .. } => {
                            let items: Vec<Option<&Map<String, JsonValue>>> =
                                match nested.and_then(|v| v.as_array()) {
                                    Some(items) => items.iter().map(|v| v.as_object()).collect(),
                                    None if fresh => Vec::new(),
                                    None => template.initial.iter().map(|v| v.as_object()).collect(),
                                };

                            let mut keys = Vec::new();
                            for _ in 0..items.len().max(min) {
                                match node.reserve_instance() {
                                    Ok(key) => keys.push(key),
                                    Err(error) => {
                                        warn!(%error, "initial data exceeds the collection maximum");
                                        break;
                                    }
                                }
                            }
                            self.collections.insert(node);

                            for (position, key) in keys.into_iter().enumerate() {
                                let item = items.get(position).copied().flatten();
                                self.instantiate(
                                    &template.children,
                                    &path.instance(key),
                                    item,
                                    fresh,
                                    owners,
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    fn bind_owners(&mut self, owners: Vec<(FieldPath, Vec<CompiledCondition>)>) -> Vec<ConditionId> {
        let fields = &self.fields;
        let mut ids = Vec::new();
        for (owner, conditions) in owners {
            for condition in conditions {
                ids.push(self.index.bind(
                    owner.clone(),
                    condition.kind,
                    condition.expr,
                    |owner, segments| resolve_reference(fields, owner, segments),
                ));
            }
        }
        ids
    }

    /// Re-resolve `ids`; returns the ones whose bindings moved
    fn rebind(&mut self, ids: Vec<ConditionId>) -> Vec<ConditionId> {
        let fields = &self.fields;
        ids.into_iter()
            .filter(|id| {
                self.index
                    .rebind(*id, |owner, segments| resolve_reference(fields, owner, segments))
            })
            .collect()
    }

    /// Own plus inherited (visible, enabled) state of a field or collection
    pub(crate) fn effective(&self, path: &FieldPath) -> (bool, bool) {
        let (mut visible, mut enabled) = if let Some(node) = self.fields.get(path) {
            (node.visibility.is_visible(), node.enablement.is_enabled())
        } else if let Some(node) = self.collections.get(path) {
            (node.visibility.is_visible(), node.enablement.is_enabled())
        } else {
            return (false, false);
        };

        for ancestor in path.ancestors() {
            if let Some(collection) = self.collections.get(&ancestor) {
                visible &= collection.visibility.is_visible();
                enabled &= collection.enablement.is_enabled();
            }
        }
        (visible, enabled)
    }

    /// Evaluate `seeds` and everything their results reach
    fn settle(&mut self, seeds: Vec<ConditionId>) -> BTreeSet<FieldPath> {
        let mut queue = VecDeque::new();
        let mut queued = HashSet::new();
        for id in seeds {
            if queued.insert(id) {
                queue.push_back(id);
            }
        }

        let mut touched = BTreeSet::new();
        // bounded so a cycle introduced by re-resolution cannot spin forever
        let budget = (self.index.len() + 1) * 8;
        let mut steps = 0;

        while let Some(id) = queue.pop_front() {
            queued.remove(&id);
            steps += 1;
            if steps > budget {
                warn!(budget, "condition propagation did not settle");
                break;
            }

            let Some(condition) = self.index.get(id) else {
                continue;
            };
            let owner = condition.owner.clone();
            let result = evaluate_condition(
                &condition.expr,
                &BoundScope {
                    state: self,
                    condition,
                },
            );
            self.evaluations += 1;
            self.index.record_result(id, result);
            touched.insert(owner.clone());

            for field in self.apply_owner_state(&owner) {
                for subscriber in self.index.subscribers(&field) {
                    if queued.insert(subscriber) {
                        queue.push_back(subscriber);
                    }
                }
            }
        }

        touched
    }

    /// Push the owner's condition results into its flags; returns fields
    /// whose visibility to expressions may have changed
    fn apply_owner_state(&mut self, owner: &FieldPath) -> Vec<FieldPath> {
        let state = self.index.owner_state(owner);
        let visibility = if state.hidden {
            Visibility::Hidden
        } else {
            Visibility::Visible
        };
        let enablement = if state.disabled {
            Enablement::Disabled
        } else {
            Enablement::Enabled
        };

        if let Some(node) = self.fields.get_mut(owner) {
            let hid = node.visibility != visibility;
            let disabled = node.enablement != enablement;
            node.visibility = visibility;
            node.enablement = enablement;
            if (hid && state.hidden) || (disabled && state.disabled) {
                node.clear_error();
            }
            if hid || disabled {
                debug!(path = %owner, ?visibility, ?enablement, "field state changed");
            }
            return if hid { vec![owner.clone()] } else { Vec::new() };
        }

        let Some(node) = self.collections.get_mut(owner) else {
            return Vec::new();
        };
        let hid = node.visibility != visibility;
        let disabled = node.enablement != enablement;
        node.visibility = visibility;
        node.enablement = enablement;
        if hid || disabled {
            debug!(path = %owner, ?visibility, ?enablement, "collection state changed");
        }

        let below = self.fields.paths_under(owner);
        if (hid && state.hidden) || (disabled && state.disabled) {
            for path in &below {
                if let Some(field) = self.fields.get_mut(path) {
                    field.clear_error();
                }
            }
        }
        if hid {
            below
        } else {
            Vec::new()
        }
    }

    pub(crate) fn set_value(&mut self, path: &FieldPath, value: JsonValue) -> FormsetResult<BTreeSet<FieldPath>> {
        self.fields.set_value(path, value)?;
        let seeds = self.index.subscribers(path);
        Ok(self.settle(seeds))
    }

    pub(crate) fn add_instance(&mut self, collection: &FieldPath) -> FormsetResult<FieldPath> {
        let node = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| FormsetError::UnknownCollection(collection.clone()))?;
        let key = node.reserve_instance()?;
        let template = Arc::clone(&node.template);

        let instance = collection.instance(key);
        let mut owners = Vec::new();
        self.instantiate(&template.children, &instance, None, true, &mut owners);

        let mut seeds = self.bind_owners(owners);
        let unresolved = self.index.unresolved();
        seeds.extend(self.rebind(unresolved));
        self.settle(seeds);

        info!(collection = %collection, instance = %instance, "instance added");
        Ok(instance)
    }

    pub(crate) fn remove_instance(&mut self, collection: &FieldPath, index: usize) -> FormsetResult<()> {
        let node = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| FormsetError::UnknownCollection(collection.clone()))?;
        let key = node.detach_instance(index)?;

        let instance = collection.instance(key);
        self.fields.remove_subtree(&instance);
        self.collections.remove_subtree(&instance);
        self.index.unbind_owned_by(&instance);
        let abandoned = self.uploads.abandon_under(&instance);

        let stale = self.index.reading_under(&instance);
        self.rebind(stale.clone());
        self.settle(stale);

        info!(collection = %collection, instance = %instance, abandoned, "instance removed");
        Ok(())
    }

    pub(crate) fn validate(&mut self) -> ValidationReport {
        let root = Arc::clone(&self.root);
        let mut report = ValidationReport::default();
        let valid = self.validate_level(&root.children, &FieldPath::root(), &mut report);
        report.valid = valid;
        debug!(valid = report.valid, invalid = report.invalid_fields.len(), "validated");
        report
    }

    fn validate_level(
        &mut self,
        children: &[TemplateNode],
        prefix: &FieldPath,
        report: &mut ValidationReport,
    ) -> bool {
        let mut valid = true;

        for child in children {
            match child {
                TemplateNode::Field(template) => {
                    let path = prefix.child(&template.name);
                    if self.effective(&path) != (true, true) {
                        continue;
                    }
                    let Some(node) = self.fields.get_mut(&path) else {
                        continue;
                    };

                    let keep = node.validity.is_invalid()
                        && matches!(node.error_source, Some(ErrorSource::Server | ErrorSource::Upload));
                    if !keep {
                        match node.constraints.check(node.input, &node.value) {
                            Validity::Invalid(reasons) => node.mark_invalid(reasons, ErrorSource::Client),
                            verdict => {
                                node.validity = verdict;
                                node.error_source = None;
                            }
                        }
                    }
                    if node.validity.is_invalid() {
                        valid = false;
                        report.invalid_fields.push(path);
                    }
                }
                TemplateNode::Collection(template) => {
                    let path = prefix.child(&template.name);
                    if self.effective(&path) != (true, true) {
                        continue;
                    }
                    let Some(node) = self.collections.get(&path) else {
                        continue;
                    };

                    let mut verdict = CollectionValidity::default();
                    if node.is_repeatable() {
                        let keys = node.instances.clone();
                        let (min, _) = template.cardinality.bounds();
                        verdict.below_minimum = keys.len() < min;
                        let mut all = true;
                        for key in keys {
                            let ok = self.validate_level(&template.children, &path.instance(key), report);
                            verdict.instances.push((key, ok));
                            all &= ok;
                        }
                        verdict.valid = all && !verdict.below_minimum;
                    } else {
                        verdict.valid = self.validate_level(&template.children, &path, report);
                    }

                    valid &= verdict.valid;
                    report.collections.insert(path, verdict);
                }
            }
        }

        valid
    }

    pub(crate) fn begin_submission(&mut self, control: Option<&str>) -> SubmitRequest {
        let request = sync::build_request(self, control);
        info!(control = control.unwrap_or("-"), "submission prepared");
        request
    }

    pub(crate) fn apply_submission(
        &mut self,
        snapshot: &SubmissionSnapshot,
        result: Result<SubmitResponse, TransportError>,
    ) -> Outcome {
        self.clear_server_errors();
        self.success_url = None;

        match result {
            Ok(SubmitResponse::Accepted { success_url }) => {
                info!(success_url = success_url.as_deref().unwrap_or("-"), "submission accepted");
                self.success_url = success_url;
                Outcome::Success
            }
            Ok(SubmitResponse::Rejected { errors }) => {
                let report = sync::map_errors(self, snapshot, &errors);
                for (path, reasons) in report.field_errors {
                    if let Some(node) = self.fields.get_mut(&path) {
                        node.mark_invalid(reasons, ErrorSource::Server);
                    }
                }
                self.non_field_errors = report.non_field_errors;
                info!(non_field = self.non_field_errors.len(), "submission rejected");
                Outcome::Failure
            }
            Err(error) => {
                warn!(%error, "submission failed");
                self.non_field_errors = vec![error.to_string()];
                Outcome::Failure
            }
        }
    }

    fn clear_server_errors(&mut self) {
        for node in self.fields.iter_mut() {
            if node.error_source == Some(ErrorSource::Server) {
                node.clear_error();
            }
        }
        self.non_field_errors.clear();
    }

    fn clear_errors(&mut self) {
        for node in self.fields.iter_mut() {
            node.clear_error();
        }
        self.non_field_errors.clear();
    }

    pub(crate) fn select_file(&mut self, path: &FieldPath, file: FileSelection) -> FormsetResult<UploadRequest> {
        self.require_file_field(path)?;
        let (request, value) = self.uploads.begin(path, file);
        self.set_value(path, value)?;
        Ok(request)
    }

    pub(crate) fn complete_upload(
        &mut self,
        id: HandleId,
        result: Result<FileHandle, UploadError>,
    ) -> FormsetResult<Option<UploadStatus>> {
        let Some(handle) = self.uploads.complete(id, result) else {
            return Ok(None);
        };
        let field = handle.field.clone();
        let status = handle.status.clone();

        match &status {
            UploadStatus::Uploaded { file } => {
                info!(handle = %id, field = %field, "upload finished");
                self.set_value(&field, json!([file.to_json()]))?;
            }
            UploadStatus::Failed { reason } => {
                warn!(handle = %id, field = %field, %reason, "upload failed");
                self.set_value(&field, json!([]))?;
                if let Some(node) = self.fields.get_mut(&field) {
                    node.mark_invalid(vec![reason.clone()], ErrorSource::Upload);
                }
            }
            UploadStatus::Pending | UploadStatus::Abandoned => {}
        }
        Ok(Some(status))
    }

    pub(crate) fn clear_file(&mut self, path: &FieldPath) -> FormsetResult<BTreeSet<FieldPath>> {
        self.require_file_field(path)?;
        self.uploads.abandon_field(path);
        self.set_value(path, json!([]))
    }

    fn require_file_field(&self, path: &FieldPath) -> FormsetResult<()> {
        let node = self
            .fields
            .get(path)
            .ok_or_else(|| FormsetError::UnknownField(path.clone()))?;
        if node.input != InputKind::File {
            return Err(FormsetError::NotAFileField(path.clone()));
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.uploads.clear();
        self.fields.clear();
        self.collections.clear();
        self.index.clear();
        self.non_field_errors.clear();
        self.success_url = None;
        for status in self.control_status.values_mut() {
            status.error = None;
        }
        self.populate();
        info!(fields = self.fields.len(), "formset reset");
    }

    /// Field paths in document order
    pub(crate) fn field_paths(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        self.collect_paths(&self.root.children, &FieldPath::root(), &mut out);
        out
    }

    fn collect_paths(&self, children: &[TemplateNode], prefix: &FieldPath, out: &mut Vec<FieldPath>) {
        for child in children {
            match child {
                TemplateNode::Field(template) => out.push(prefix.child(&template.name)),
                TemplateNode::Collection(template) => {
                    let path = prefix.child(&template.name);
                    match self.collections.get(&path) {
                        Some(node) if node.is_repeatable() => {
                            for key in &node.instances {
                                self.collect_paths(&template.children, &path.instance(*key), out);
                            }
                        }
                        Some(_) => self.collect_paths(&template.children, &path, out),
                        None => {}
                    }
                }
            }
        }
    }

    fn first_error(&self) -> Option<FieldPath> {
        self.field_paths().into_iter().find(|path| {
            self.fields
                .get(path)
                .map(|node| node.validity.is_invalid())
                .unwrap_or(false)
        })
    }

    fn status_mut(&mut self, control: &str) -> &mut ControlStatus {
        self.control_status.entry(control.to_string()).or_default()
    }

    fn emit(&mut self, control: &str, kind: EffectKind) {
        debug!(control, effect = ?kind, "effect");
        self.effects.push(Effect {
            control: control.to_string(),
            kind,
        });
    }

    /// Capacity violations fail the step and are reported on the control
    fn outcome_of(&mut self, control: &str, result: FormsetResult<()>) -> FormsetResult<StepResult> {
        match result {
            Ok(()) => {
                self.status_mut(control).error = None;
                Ok(StepResult::Continue(Some(Outcome::Success)))
            }
            Err(FormsetError::Capacity(error)) => {
                warn!(control, %error, "capacity error");
                self.status_mut(control).error = Some(error.to_string());
                Ok(StepResult::Continue(Some(Outcome::Failure)))
            }
            Err(error) => Err(error),
        }
    }
}

impl CommandHost for FormState {
    fn execute(&mut self, control: &str, command: &Command, _prior: Outcome) -> FormsetResult<StepResult> {
        let step = match command {
            Command::Disable => {
                self.status_mut(control).disabled = true;
                StepResult::Continue(None)
            }
            Command::Enable => {
                self.status_mut(control).disabled = false;
                StepResult::Continue(None)
            }
            Command::Submit => {
                let request = self.begin_submission(Some(control));
                self.pending_submissions
                    .insert(control.to_string(), request.snapshot.clone());
                StepResult::Suspend(Suspension::Submit(request))
            }
            Command::Validate => {
                let report = self.validate();
                StepResult::Continue(Some(Outcome::from_success(report.valid)))
            }
            Command::Reset => {
                self.reset();
                StepResult::Continue(None)
            }
            Command::ClearErrors => {
                self.clear_errors();
                StepResult::Continue(None)
            }
            Command::Proceed(url) => {
                match url.clone().or_else(|| self.success_url.clone()) {
                    Some(url) => self.emit(control, EffectKind::Navigate(url)),
                    None => warn!(control, "proceed has no target"),
                }
                StepResult::Continue(None)
            }
            Command::Reload => {
                self.emit(control, EffectKind::Reload);
                StepResult::Continue(None)
            }
            Command::Delay(ms) => StepResult::Suspend(Suspension::Delay(Duration::from_millis(*ms))),
            Command::Spinner => {
                self.emit(control, EffectKind::Spinner);
                StepResult::Continue(None)
            }
            Command::Okay => {
                self.emit(control, EffectKind::Okay);
                StepResult::Continue(None)
            }
            Command::Bummer => {
                self.emit(control, EffectKind::Bummer);
                StepResult::Continue(None)
            }
            Command::ScrollToError => {
                let target = self.first_error();
                self.emit(control, EffectKind::ScrollToError(target));
                StepResult::Continue(None)
            }
            Command::Emit(event) => {
                self.emit(control, EffectKind::Emit(event.clone()));
                StepResult::Continue(None)
            }
            Command::AwaitUpload(path) => {
                let path: FieldPath = path.parse()?;
                if !self.fields.contains(&path) {
                    return Err(FormsetError::UnknownField(path));
                }
                match self.uploads.current_for(&path).map(|h| (h.id, h.status.clone())) {
                    None => StepResult::Continue(Some(Outcome::Success)),
                    Some((id, UploadStatus::Pending)) => {
                        self.uploads.watch(id);
                        StepResult::Suspend(Suspension::AwaitUpload(id))
                    }
                    Some((_, UploadStatus::Uploaded { .. })) => StepResult::Continue(Some(Outcome::Success)),
                    Some(_) => StepResult::Continue(Some(Outcome::Failure)),
                }
            }
            Command::AddInstance(path) => {
                let path: FieldPath = path.parse()?;
                let result = self.add_instance(&path).map(|_| ());
                return self.outcome_of(control, result);
            }
            Command::RemoveInstance(path, index) => {
                let path: FieldPath = path.parse()?;
                let result = self.remove_instance(&path, *index);
                return self.outcome_of(control, result);
            }
        };
        Ok(step)
    }

    fn resolve(
        &mut self,
        control: &str,
        waiting: Waiting,
        resolution: Resolution,
        prior: Outcome,
    ) -> FormsetResult<Outcome> {
        match (waiting, resolution) {
            (Waiting::Submission, Resolution::Submitted(result)) => {
                let snapshot = self
                    .pending_submissions
                    .remove(control)
                    .unwrap_or_default();
                Ok(self.apply_submission(&snapshot, result))
            }
            (Waiting::Delay, Resolution::Elapsed) => Ok(prior),
            (Waiting::Upload(id), Resolution::UploadSettled) => {
                let outcome = match self.uploads.get(id).map(|h| &h.status) {
                    Some(UploadStatus::Pending) => return Err(FormsetError::UploadPending(id)),
                    Some(UploadStatus::Uploaded { .. }) => Outcome::Success,
                    _ => Outcome::Failure,
                };
                self.uploads.unwatch(id);
                Ok(outcome)
            }
            (waiting, resolution) => Err(FormsetError::UnexpectedResolution {
                control: control.to_string(),
                expected: waiting.describe(),
                received: resolution.describe(),
            }),
        }
    }
}

impl Formset {
    /// Build a formset; broken attributes become diagnostics, broken structure an error
    #[instrument(skip(schema), fields(nodes = schema.nodes.len(), controls = schema.controls.len()))]
    pub fn new(schema: &FormsetSchema) -> FormsetResult<Self> {
        let mut diagnostics = Vec::new();
        let root = template::compile(&schema.nodes, &mut diagnostics)?;
        let mut state = FormState::new(root);

        let mut controls = BTreeMap::new();
        for control in &schema.controls {
            if controls.contains_key(&control.name) {
                return Err(FormsetError::InvalidSchema(format!(
                    "duplicate control '{}'",
                    control.name
                )));
            }

            let text = control.action_text();
            let entry = match parse_action_chain(text) {
                Ok(chain) => Control {
                    runner: Some(ChainRunner::new(chain)),
                    unavailable: None,
                },
                Err(error) => {
                    warn!(control = %control.name, %error, "rejected action chain");
                    let reason = error.to_string();
                    diagnostics.push(Diagnostic {
                        origin: format!("control '{}'", control.name),
                        attribute: "actions".to_string(),
                        text: text.to_string(),
                        problem: Problem::Parse(error),
                    });
                    Control {
                        runner: None,
                        unavailable: Some(reason),
                    }
                }
            };
            controls.insert(control.name.clone(), entry);
            state
                .control_status
                .insert(control.name.clone(), ControlStatus::default());
        }

        state.populate();
        info!(
            fields = state.fields.len(),
            collections = state.collections.len(),
            conditions = state.index.len(),
            diagnostics = diagnostics.len(),
            "formset initialized"
        );

        Ok(Self {
            state,
            controls,
            diagnostics,
        })
    }

    pub fn from_json(schema: &str) -> FormsetResult<Self> {
        Self::new(&FormsetSchema::from_json(schema)?)
    }

    /// Attributes rejected at initialization
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // ---------------------------------------------------------------------
    // Field graph
    // ---------------------------------------------------------------------

    pub fn field(&self, path: &FieldPath) -> Option<&FieldNode> {
        self.state.fields.get(path)
    }

    /// Field paths in document order
    pub fn field_paths(&self) -> Vec<FieldPath> {
        self.state.field_paths()
    }

    pub fn is_visible(&self, path: &FieldPath) -> bool {
        self.state.effective(path).0
    }

    pub fn is_enabled(&self, path: &FieldPath) -> bool {
        self.state.effective(path).1
    }

    /// Update a field; returns the owners of every condition re-evaluated as a result
    #[instrument(skip(self, value), fields(path = %path))]
    pub fn set_value(&mut self, path: &FieldPath, value: JsonValue) -> FormsetResult<BTreeSet<FieldPath>> {
        self.state.set_value(path, value)
    }

    /// Nested mapping of visible-and-enabled fields
    pub fn submission_payload(&self) -> JsonValue {
        sync::build_payload(&self.state)
    }

    pub fn evaluation_count(&self) -> u64 {
        self.state.evaluations
    }

    pub fn condition_count(&self) -> usize {
        self.state.index.len()
    }

    // ---------------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------------

    pub fn collection(&self, path: &FieldPath) -> Option<&CollectionNode> {
        self.state.collections.get(path)
    }

    pub fn add_instance(&mut self, collection: &FieldPath) -> FormsetResult<FieldPath> {
        self.state.add_instance(collection)
    }

    pub fn remove_instance(&mut self, collection: &FieldPath, index: usize) -> FormsetResult<()> {
        self.state.remove_instance(collection, index)
    }

    pub fn validate(&mut self) -> ValidationReport {
        self.state.validate()
    }

    // ---------------------------------------------------------------------
    // Uploads
    // ---------------------------------------------------------------------

    pub fn select_file(&mut self, path: &FieldPath, file: FileSelection) -> FormsetResult<UploadRequest> {
        self.state.select_file(path, file)
    }

    /// Feed back a transfer result; `None` when the handle was abandoned meanwhile
    pub fn complete_upload(
        &mut self,
        id: HandleId,
        result: Result<FileHandle, UploadError>,
    ) -> FormsetResult<Option<UploadStatus>> {
        self.state.complete_upload(id, result)
    }

    pub fn clear_file(&mut self, path: &FieldPath) -> FormsetResult<BTreeSet<FieldPath>> {
        self.state.clear_file(path)
    }

    pub fn upload(&self, id: HandleId) -> Option<&UploadHandle> {
        self.state.uploads.get(id)
    }

    pub fn upload_for_field(&self, path: &FieldPath) -> Option<&UploadHandle> {
        self.state.uploads.current_for(path)
    }

    // ---------------------------------------------------------------------
    // Submission
    // ---------------------------------------------------------------------

    /// Serialize the formset for a submission made outside any chain
    pub fn begin_submission(&mut self) -> SubmitRequest {
        self.state.begin_submission(None)
    }

    pub fn finish_submission(
        &mut self,
        request: &SubmitRequest,
        result: Result<SubmitResponse, TransportError>,
    ) -> Outcome {
        self.state.apply_submission(&request.snapshot, result)
    }

    pub fn non_field_errors(&self) -> &[String] {
        &self.state.non_field_errors
    }

    pub fn success_url(&self) -> Option<&str> {
        self.state.success_url.as_deref()
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    // ---------------------------------------------------------------------
    // Controls
    // ---------------------------------------------------------------------

    pub fn control_names(&self) -> impl Iterator<Item = &str> {
        self.controls.keys().map(String::as_str)
    }

    pub fn chain_state(&self, control: &str) -> Option<&ChainState> {
        self.controls
            .get(control)
            .and_then(|c| c.runner.as_ref())
            .map(|r| r.state())
    }

    pub fn control_status(&self, control: &str) -> Option<&ControlStatus> {
        self.state.control_status.get(control)
    }

    /// Run the control's chain until it completes or needs the driver
    pub fn activate(&mut self, control: &str) -> FormsetResult<Progress> {
        let entry = self
            .controls
            .get_mut(control)
            .ok_or_else(|| FormsetError::UnknownControl(control.to_string()))?;
        let Some(runner) = entry.runner.as_mut() else {
            return Err(FormsetError::ControlUnavailable {
                control: control.to_string(),
                reason: entry.unavailable.clone().unwrap_or_default(),
            });
        };
        Ok(runner.start(control, &mut self.state))
    }

    pub fn resume(&mut self, control: &str, resolution: Resolution) -> FormsetResult<Progress> {
        let entry = self
            .controls
            .get_mut(control)
            .ok_or_else(|| FormsetError::UnknownControl(control.to_string()))?;
        let Some(runner) = entry.runner.as_mut() else {
            return Err(FormsetError::NotSuspended(control.to_string()));
        };
        runner.resume(control, &mut self.state, resolution)
    }

    /// Drain UI effects recorded since the last call
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.state.effects)
    }

    pub fn view(&self) -> FormsetView {
        let fields = self
            .field_paths()
            .into_iter()
            .filter_map(|path| {
                let node = self.state.fields.get(&path)?;
                let (visible, enabled) = self.state.effective(&path);
                Some(FieldView {
                    path: path.to_string(),
                    value: node.value.clone(),
                    validity: node.validity.clone(),
                    visible,
                    enabled,
                    dirty: node.dirty,
                })
            })
            .collect();

        let collections = self
            .state
            .collections
            .iter()
            .filter(|c| c.is_repeatable())
            .map(|c| (c.path.to_string(), c.instances.clone()))
            .collect();

        FormsetView {
            fields,
            collections,
            non_field_errors: self.state.non_field_errors.clone(),
            controls: self.state.control_status.clone(),
        }
    }
}

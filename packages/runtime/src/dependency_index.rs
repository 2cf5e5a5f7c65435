//! Reverse dependency index
//!
//! Every condition bound to a live node is registered here together with
//! the concrete field paths its references resolved to. The reverse map
//! `field path -> conditions reading it` is what keeps re-evaluation local:
//! a value change only touches the conditions subscribed to that path.

use crate::path::FieldPath;
use formset_parser::Expr;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConditionId(u64);

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionKind {
    ShowIf,
    HideIf,
    DisableIf,
}

impl ConditionKind {
    pub fn attribute(&self) -> &'static str {
        match self {
            ConditionKind::ShowIf => "show-if",
            ConditionKind::HideIf => "hide-if",
            ConditionKind::DisableIf => "disable-if",
        }
    }
}

/// Where one dotted reference currently points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub path: FieldPath,
    /// False when no candidate path exists; the reference reads as absent
    pub resolved: bool,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub id: ConditionId,
    pub owner: FieldPath,
    pub kind: ConditionKind,
    pub expr: Arc<Expr>,
    pub(crate) bindings: BTreeMap<Vec<String>, Binding>,
    pub(crate) last_result: Option<bool>,
}

impl Condition {
    pub fn bindings(&self) -> impl Iterator<Item = (&[String], &Binding)> {
        self.bindings.iter().map(|(k, v)| (k.as_slice(), v))
    }

    pub fn last_result(&self) -> Option<bool> {
        self.last_result
    }

    fn depends_on(&self) -> impl Iterator<Item = &FieldPath> {
        self.bindings.values().map(|b| &b.path)
    }
}

/// Own state of a condition owner derived from its latest results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OwnerState {
    pub hidden: bool,
    pub disabled: bool,
}

#[derive(Debug, Default)]
pub struct DependencyIndex {
    conditions: BTreeMap<ConditionId, Condition>,
    by_owner: HashMap<FieldPath, Vec<ConditionId>>,
    subscribers: HashMap<FieldPath, BTreeSet<ConditionId>>,
    next_id: u64,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn get(&self, id: ConditionId) -> Option<&Condition> {
        self.conditions.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.values()
    }

    pub fn ids(&self) -> Vec<ConditionId> {
        self.conditions.keys().copied().collect()
    }

    /// Conditions reading `path`
    pub fn subscribers(&self, path: &FieldPath) -> Vec<ConditionId> {
        self.subscribers
            .get(path)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn conditions_for(&self, owner: &FieldPath) -> impl Iterator<Item = &Condition> {
        self.by_owner
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(|id| self.conditions.get(id))
    }

    /// Register a condition on `owner`, resolving each reference with `resolve`
    pub fn bind(
        &mut self,
        owner: FieldPath,
        kind: ConditionKind,
        expr: Arc<Expr>,
        resolve: impl Fn(&FieldPath, &[String]) -> Binding,
    ) -> ConditionId {
        let id = ConditionId(self.next_id);
        self.next_id += 1;

        let bindings = expr
            .references()
            .into_iter()
            .map(|r| (r.segments.clone(), resolve(&owner, &r.segments)))
            .collect();

        let condition = Condition {
            id,
            owner: owner.clone(),
            kind,
            expr,
            bindings,
            last_result: None,
        };
        self.subscribe(&condition);
        self.by_owner.entry(owner).or_default().push(id);
        self.conditions.insert(id, condition);
        id
    }

    /// Re-resolve the references of `id`; true if any binding moved
    pub fn rebind(
        &mut self,
        id: ConditionId,
        resolve: impl Fn(&FieldPath, &[String]) -> Binding,
    ) -> bool {
        let Some(mut condition) = self.conditions.remove(&id) else {
            return false;
        };
        self.unsubscribe(&condition);

        let mut changed = false;
        for (segments, binding) in condition.bindings.iter_mut() {
            let fresh = resolve(&condition.owner, segments);
            if *binding != fresh {
                *binding = fresh;
                changed = true;
            }
        }

        self.subscribe(&condition);
        self.conditions.insert(id, condition);
        changed
    }

    /// Drop every condition owned at or below `prefix`
    pub fn unbind_owned_by(&mut self, prefix: &FieldPath) -> Vec<ConditionId> {
        let owners: Vec<FieldPath> = self
            .by_owner
            .keys()
            .filter(|owner| owner.starts_with(prefix))
            .cloned()
            .collect();

        let mut removed = Vec::new();
        for owner in owners {
            for id in self.by_owner.remove(&owner).unwrap_or_default() {
                if let Some(condition) = self.conditions.remove(&id) {
                    self.unsubscribe(&condition);
                    removed.push(id);
                }
            }
        }
        removed
    }

    /// Conditions with at least one reference that resolved to nothing
    pub fn unresolved(&self) -> Vec<ConditionId> {
        self.conditions
            .values()
            .filter(|c| c.bindings.values().any(|b| !b.resolved))
            .map(|c| c.id)
            .collect()
    }

    /// Conditions reading any path at or below `prefix`
    pub fn reading_under(&self, prefix: &FieldPath) -> Vec<ConditionId> {
        self.conditions
            .values()
            .filter(|c| c.depends_on().any(|p| p.starts_with(prefix)))
            .map(|c| c.id)
            .collect()
    }

    pub(crate) fn record_result(&mut self, id: ConditionId, result: bool) {
        if let Some(condition) = self.conditions.get_mut(&id) {
            condition.last_result = Some(result);
        }
    }

    /// hide-if wins over show-if; a missing result leaves the default
    pub fn owner_state(&self, owner: &FieldPath) -> OwnerState {
        let mut show = None;
        let mut hide = None;
        let mut disable = None;

        for condition in self.conditions_for(owner) {
            match condition.kind {
                ConditionKind::ShowIf => show = condition.last_result,
                ConditionKind::HideIf => hide = condition.last_result,
                ConditionKind::DisableIf => disable = condition.last_result,
            }
        }

        OwnerState {
            hidden: hide == Some(true) || show == Some(false),
            disabled: disable == Some(true),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.conditions.clear();
        self.by_owner.clear();
        self.subscribers.clear();
    }

    fn subscribe(&mut self, condition: &Condition) {
        for path in condition.depends_on() {
            self.subscribers
                .entry(path.clone())
                .or_default()
                .insert(condition.id);
        }
    }

    fn unsubscribe(&mut self, condition: &Condition) {
        for path in condition.depends_on() {
            if let Some(ids) = self.subscribers.get_mut(path) {
                ids.remove(&condition.id);
                if ids.is_empty() {
                    self.subscribers.remove(path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formset_parser::parse_expression;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    fn resolve_at_root(_owner: &FieldPath, segments: &[String]) -> Binding {
        Binding {
            path: FieldPath::root().join_names(segments),
            resolved: true,
        }
    }

    #[test]
    fn test_subscribers_follow_references() {
        let mut index = DependencyIndex::new();
        let expr = Arc::new(parse_expression("a == 1 && b.c").unwrap());
        let id = index.bind(path("x"), ConditionKind::ShowIf, expr, resolve_at_root);

        assert_eq!(index.subscribers(&path("a")), vec![id]);
        assert_eq!(index.subscribers(&path("b.c")), vec![id]);
        assert!(index.subscribers(&path("x")).is_empty());
    }

    #[test]
    fn test_unbind_removes_subscriptions() {
        let mut index = DependencyIndex::new();
        let expr = Arc::new(parse_expression("a").unwrap());
        index.bind(path("rows[0].x"), ConditionKind::HideIf, Arc::clone(&expr), resolve_at_root);
        let kept = index.bind(path("rows[1].x"), ConditionKind::HideIf, expr, resolve_at_root);

        let removed = index.unbind_owned_by(&path("rows[0]"));
        assert_eq!(removed.len(), 1);
        assert_eq!(index.subscribers(&path("a")), vec![kept]);
    }

    #[test]
    fn test_rebind_reports_moves() {
        let mut index = DependencyIndex::new();
        let expr = Arc::new(parse_expression("a").unwrap());
        let id = index.bind(path("x"), ConditionKind::ShowIf, expr, |_, segments| Binding {
            path: FieldPath::root().join_names(segments),
            resolved: false,
        });
        assert_eq!(index.unresolved(), vec![id]);

        assert!(index.rebind(id, resolve_at_root));
        assert!(index.unresolved().is_empty());
        assert!(!index.rebind(id, resolve_at_root));
    }

    #[test]
    fn test_hide_wins_over_show() {
        let mut index = DependencyIndex::new();
        let show = index.bind(
            path("x"),
            ConditionKind::ShowIf,
            Arc::new(parse_expression("a").unwrap()),
            resolve_at_root,
        );
        let hide = index.bind(
            path("x"),
            ConditionKind::HideIf,
            Arc::new(parse_expression("b").unwrap()),
            resolve_at_root,
        );

        index.record_result(show, true);
        index.record_result(hide, true);
        assert!(index.owner_state(&path("x")).hidden);

        index.record_result(hide, false);
        assert!(!index.owner_state(&path("x")).hidden);

        index.record_result(show, false);
        assert!(index.owner_state(&path("x")).hidden);
    }
}

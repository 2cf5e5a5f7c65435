//! Arena of field nodes keyed by stable path

use crate::error::{FormsetError, FormsetResult};
use crate::field::{FieldNode, Validity};
use crate::path::FieldPath;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct FieldGraph {
    nodes: BTreeMap<FieldPath, FieldNode>,
}

impl FieldGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn insert(&mut self, node: FieldNode) {
        self.nodes.insert(node.path.clone(), node);
    }

    pub fn get(&self, path: &FieldPath) -> Option<&FieldNode> {
        self.nodes.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &FieldPath) -> Option<&mut FieldNode> {
        self.nodes.get_mut(path)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldNode> {
        self.nodes.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut FieldNode> {
        self.nodes.values_mut()
    }

    /// Paths of every field at or below `prefix`
    pub fn paths_under(&self, prefix: &FieldPath) -> Vec<FieldPath> {
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub(crate) fn remove_subtree(&mut self, prefix: &FieldPath) -> Vec<FieldPath> {
        let removed = self.paths_under(prefix);
        for path in &removed {
            self.nodes.remove(path);
        }
        removed
    }

    /// Store a new value; any prior verdict no longer applies
    pub(crate) fn set_value(&mut self, path: &FieldPath, value: JsonValue) -> FormsetResult<()> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| FormsetError::UnknownField(path.clone()))?;

        trace!(path = %path, "set value");
        node.value = value;
        node.dirty = true;
        node.validity = Validity::Unvalidated;
        node.error_source = None;
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }
}

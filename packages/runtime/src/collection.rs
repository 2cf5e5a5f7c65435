//! Collection tree
//!
//! Collections are stored flat, keyed by their path. A singleton collection
//! has its children directly under its path (`customer.name`); a repeatable
//! one owns an ordered list of instance keys and its children live under
//! `contacts[<key>]`. Keys come from a per-collection counter that never
//! goes backwards, so an instance keeps its identity while siblings are
//! added and removed.

use crate::error::{CapacityError, FormsetError, FormsetResult};
use crate::field::{Enablement, Visibility};
use crate::path::{FieldPath, InstanceKey};
use crate::schema::Cardinality;
use crate::template::CollectionTemplate;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CollectionNode {
    pub(crate) path: FieldPath,
    pub(crate) template: Arc<CollectionTemplate>,
    pub(crate) instances: Vec<InstanceKey>,
    pub(crate) next_key: u32,
    pub(crate) visibility: Visibility,
    pub(crate) enablement: Enablement,
}

impl CollectionNode {
    pub(crate) fn new(path: FieldPath, template: Arc<CollectionTemplate>) -> Self {
        Self {
            path,
            template,
            instances: Vec::new(),
            next_key: 0,
            visibility: Visibility::Visible,
            enablement: Enablement::Enabled,
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn cardinality(&self) -> Cardinality {
        self.template.cardinality
    }

    pub fn is_repeatable(&self) -> bool {
        self.template.cardinality.is_repeatable()
    }

    /// Instance keys in insertion order; empty for singletons
    pub fn instances(&self) -> &[InstanceKey] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        if self.is_repeatable() {
            self.instances.len()
        } else {
            1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn enablement(&self) -> Enablement {
        self.enablement
    }

    pub fn instance_path(&self, key: InstanceKey) -> FieldPath {
        self.path.instance(key)
    }

    pub fn position_of(&self, key: InstanceKey) -> Option<usize> {
        self.instances.iter().position(|k| *k == key)
    }

    /// Append a new instance key, respecting the declared maximum
    pub(crate) fn reserve_instance(&mut self) -> Result<InstanceKey, CapacityError> {
        let (_, max) = self.template.cardinality.bounds();
        if let Some(max) = max {
            if self.len() >= max {
                return Err(CapacityError::AtMaximum {
                    collection: self.path.clone(),
                    max,
                });
            }
        }
        let key = InstanceKey(self.next_key);
        self.next_key += 1;
        self.instances.push(key);
        Ok(key)
    }

    /// Detach the instance at `index`, respecting the declared minimum
    pub(crate) fn detach_instance(&mut self, index: usize) -> FormsetResult<InstanceKey> {
        if index >= self.instances.len() {
            return Err(FormsetError::NoSuchInstance {
                collection: self.path.clone(),
                index,
            });
        }
        let (min, _) = self.template.cardinality.bounds();
        if self.len() <= min {
            return Err(CapacityError::AtMinimum {
                collection: self.path.clone(),
                min,
            }
            .into());
        }
        Ok(self.instances.remove(index))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionTree {
    nodes: BTreeMap<FieldPath, CollectionNode>,
}

impl CollectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn insert(&mut self, node: CollectionNode) {
        self.nodes.insert(node.path.clone(), node);
    }

    pub fn get(&self, path: &FieldPath) -> Option<&CollectionNode> {
        self.nodes.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &FieldPath) -> Option<&mut CollectionNode> {
        self.nodes.get_mut(path)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionNode> {
        self.nodes.values()
    }

    /// Instance key at `position` of the collection at `path`
    pub fn instance_at(&self, path: &FieldPath, position: usize) -> Option<InstanceKey> {
        self.nodes
            .get(path)
            .and_then(|node| node.instances.get(position).copied())
    }

    /// Remove every collection at or below `prefix`
    pub(crate) fn remove_subtree(&mut self, prefix: &FieldPath) -> usize {
        let doomed: Vec<FieldPath> = self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect();
        for path in &doomed {
            self.nodes.remove(path);
        }
        doomed.len()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }
}

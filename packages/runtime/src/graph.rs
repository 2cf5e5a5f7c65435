//! Declaration-level dependency graph
//!
//! Nodes are schema declarations (`contacts.phone`). An edge `a -> b` means
//! the state of `a` is computed from `b`: a condition owner depends on the
//! fields its expressions reference, and every field depends on the
//! conditional collections that enclose it. The runtime refuses cycles, so
//! propagation always settles.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default)]
pub struct DeclarationGraph {
    /// declaration -> declarations it reads
    dependencies: BTreeMap<String, BTreeSet<String>>,

    /// declaration -> declarations reading it
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DeclarationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency relationship: source depends on target
    pub fn add_dependency(&mut self, source: &str, target: &str) {
        self.dependencies
            .entry(source.to_string())
            .or_default()
            .insert(target.to_string());

        self.dependents
            .entry(target.to_string())
            .or_default()
            .insert(source.to_string());
    }

    pub fn dependencies_of(&self, node: &str) -> impl Iterator<Item = &String> {
        self.dependencies.get(node).into_iter().flatten()
    }

    pub fn dependents_of(&self, node: &str) -> impl Iterator<Item = &String> {
        self.dependents.get(node).into_iter().flatten()
    }

    /// Find one cycle with DFS; returns its nodes in edge order
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();

        for node in self.dependencies.keys() {
            if !visited.contains(node) {
                if let Some(cycle) = self.dfs_find_cycle(node, &mut visited, &mut stack) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs_find_cycle(
        &self,
        node: &str,
        visited: &mut BTreeSet<String>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        for dep in self.dependencies_of(node) {
            if let Some(at) = stack.iter().position(|n| n == dep) {
                return Some(stack[at..].to_vec());
            }
            if !visited.contains(dep) {
                if let Some(cycle) = self.dfs_find_cycle(dep, visited, stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        None
    }

    /// Everything that transitively depends on `node`
    pub fn transitive_dependents(&self, node: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue = vec![node.to_string()];

        while let Some(current) = queue.pop() {
            for dependent in self.dependents_of(&current) {
                if seen.insert(dependent.clone()) {
                    queue.push(dependent.clone());
                }
            }
        }

        seen.remove(node);
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acyclic_graph() {
        let mut graph = DeclarationGraph::new();
        graph.add_dependency("b", "a");
        graph.add_dependency("c", "b");
        assert_eq!(graph.find_cycle(), None);

        let dependents: Vec<_> = graph.transitive_dependents("a").into_iter().collect();
        assert_eq!(dependents, vec!["b", "c"]);
    }

    #[test]
    fn test_cycle_reports_members() {
        let mut graph = DeclarationGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("c", "a");
        graph.add_dependency("d", "a");

        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let mut graph = DeclarationGraph::new();
        graph.add_dependency("a", "a");
        assert_eq!(graph.find_cycle(), Some(vec!["a".to_string()]));
    }
}

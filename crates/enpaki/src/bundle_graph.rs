//! Dependency graph of the modules packed into one artifact
//!
//! The graph is bookkeeping only: the graph builder records an edge for every rewritten
//! `require` so the pipeline can report circular dependency groups. Cycles are legal in
//! the artifact; the runtime loader hands the second party of a cycle the first party's
//! partially filled exports.

use indexmap::IndexSet;
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;

use crate::identity::ModuleIdentity;

#[derive(Debug, Default, Clone)]
pub struct BundleGraph {
    graph: DiGraph<ModuleIdentity, ()>,
    nodes: FxHashMap<ModuleIdentity, NodeIndex>,
    edges: IndexSet<(NodeIndex, NodeIndex)>,
}

impl BundleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module if it is not known yet
    pub fn add_module(&mut self, identity: &ModuleIdentity) -> NodeIndex {
        if let Some(&index) = self.nodes.get(identity) {
            return index;
        }
        let index = self.graph.add_node(identity.clone());
        self.nodes.insert(identity.clone(), index);
        index
    }

    /// Record that `from` requires `to`; repeated references collapse into one edge
    pub fn add_dependency(&mut self, from: &ModuleIdentity, to: &ModuleIdentity) {
        let from = self.add_module(from);
        let to = self.add_module(to);
        if self.edges.insert((from, to)) {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn module_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Identities required directly by `identity`, in insertion order
    pub fn dependencies_of(&self, identity: &ModuleIdentity) -> Vec<&ModuleIdentity> {
        let Some(&index) = self.nodes.get(identity) else {
            return Vec::new();
        };
        self.edges
            .iter()
            .filter(|(from, _)| *from == index)
            .map(|(_, to)| &self.graph[*to])
            .collect()
    }

    /// Groups of modules that depend on each other, each sorted by identity
    ///
    /// A group is either a strongly connected component with more than one module, or a
    /// single module that requires itself.
    pub fn circular_groups(&self) -> Vec<Vec<ModuleIdentity>> {
        let mut groups: Vec<Vec<ModuleIdentity>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.edges.contains(&(component[0], component[0]))
            })
            .map(|component| {
                let mut group: Vec<ModuleIdentity> = component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect();
                group.sort();
                group
            })
            .collect();
        groups.sort();
        groups
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::*;

    fn id(path: &str) -> ModuleIdentity {
        ModuleIdentity::from_location(Path::new("/p"), &Path::new("/p").join(path))
    }

    #[test]
    fn test_acyclic_graph_has_no_groups() {
        let mut graph = BundleGraph::new();
        graph.add_dependency(&id("entry.js"), &id("a.js"));
        graph.add_dependency(&id("a.js"), &id("b.js"));
        graph.add_dependency(&id("entry.js"), &id("b.js"));

        assert_eq!(graph.module_count(), 3);
        assert_eq!(graph.dependency_count(), 3);
        assert!(graph.circular_groups().is_empty());
    }

    #[test]
    fn test_cycle_is_reported_once() {
        let mut graph = BundleGraph::new();
        graph.add_dependency(&id("entry.js"), &id("a.js"));
        graph.add_dependency(&id("a.js"), &id("b.js"));
        graph.add_dependency(&id("b.js"), &id("a.js"));
        graph.add_dependency(&id("b.js"), &id("a.js"));

        assert_eq!(graph.dependency_count(), 3);
        assert_eq!(graph.circular_groups(), vec![vec![id("a.js"), id("b.js")]]);
    }

    #[test]
    fn test_self_reference_is_a_group() {
        let mut graph = BundleGraph::new();
        graph.add_dependency(&id("a.js"), &id("a.js"));
        assert_eq!(graph.circular_groups(), vec![vec![id("a.js")]]);
    }

    #[test]
    fn test_dependencies_of() {
        let mut graph = BundleGraph::new();
        graph.add_dependency(&id("entry.js"), &id("a.js"));
        graph.add_dependency(&id("entry.js"), &id("b.js"));

        assert_eq!(
            graph.dependencies_of(&id("entry.js")),
            vec![&id("a.js"), &id("b.js")]
        );
        assert!(graph.dependencies_of(&id("missing.js")).is_empty());
    }
}

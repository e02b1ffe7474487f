//! Update Scheduler
//!
//! The scheduler owns the dependency graph and decides which nodes a write
//! affects, and in what order they should be looked at.
//!
//! # Algorithm
//!
//! 1. When a source node changes, mark its direct dependents "dirty"
//! 2. Propagate "maybe dirty" to their dependents, recursively
//! 3. Sort every touched node topologically (dependencies before dependents)
//! 4. The runtime then walks the effects in that order:
//!    - "dirty" effects run
//!    - "maybe dirty" effects first refresh their derived inputs, and run
//!      only if one of them actually produced a new value
//!
//! This "push-pull" approach minimizes unnecessary recomputation.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;

use super::node::{Node, NodeKind};
use crate::reactive::NodeId;

/// The update scheduler manages the dependency graph.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph along with all edges involving it.
    ///
    /// The removed node is handed back so the caller controls when its job
    /// is dropped.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        Some(node)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    ///
    /// Edges are only added between nodes that both exist.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if !self.nodes.contains_key(&dependency) || !self.nodes.contains_key(&dependent) {
            return;
        }
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.remove_dependency(dependency);
        }
    }

    /// Replace the dependency set of `node_id` with `dependencies`.
    ///
    /// Does nothing if the node was removed while it ran.
    pub fn set_dependencies(&mut self, node_id: NodeId, dependencies: IndexSet<NodeId>) {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        let previous = node.take_dependencies();

        for stale in previous.difference(&dependencies) {
            if let Some(dep) = self.nodes.get_mut(stale) {
                dep.remove_dependent(node_id);
            }
        }
        for dependency in dependencies {
            self.add_edge(dependency, node_id);
        }
    }

    /// Mark a source node as changed and propagate dirty flags.
    ///
    /// Returns every touched node in topological order.
    pub fn mark_changed(&mut self, source_id: NodeId) -> Vec<NodeId> {
        let mut to_process = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        // Direct dependents read the source itself: they are dirty for sure.
        if let Some(source) = self.nodes.get(&source_id) {
            for dependent_id in source.dependents() {
                queue.push_back((*dependent_id, true));
            }
        }

        // BFS to propagate maybe-dirty status
        while let Some((node_id, direct)) = queue.pop_front() {
            if !visited.insert(node_id) {
                if direct {
                    if let Some(node) = self.nodes.get_mut(&node_id) {
                        node.mark_dirty();
                    }
                }
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&node_id) {
                if direct {
                    node.mark_dirty();
                } else {
                    node.mark_maybe_dirty();
                }
                to_process.push(node_id);

                for dependent_id in node.dependents() {
                    queue.push_back((*dependent_id, false));
                }
            }
        }

        self.topological_sort(to_process)
    }

    /// Mark the maybe-dirty dependents of `node_id` dirty. Called after a
    /// derived node produced a new value.
    pub fn confirm_changed(&mut self, node_id: NodeId) {
        let dependents: Vec<NodeId> = match self.nodes.get(&node_id) {
            Some(node) => node.dependents().iter().copied().collect(),
            None => return,
        };
        for dependent_id in dependents {
            if let Some(dependent) = self.nodes.get_mut(&dependent_id) {
                if !dependent.is_clean() {
                    dependent.mark_dirty();
                }
            }
        }
    }

    /// Perform a topological sort of the given nodes.
    ///
    /// Returns nodes in order such that dependencies come before dependents.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        // Calculate in-degrees (only counting edges within the node set)
        for &node_id in &nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(&dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    /// Whether `node_id` is an effect.
    pub fn is_effect(&self, node_id: NodeId) -> bool {
        self.nodes
            .get(&node_id)
            .is_some_and(|node| node.kind() == NodeKind::Effect)
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::DirtyState;
    use std::rc::Rc;

    fn derived() -> Node {
        Node::derived(Rc::new(|| true))
    }

    fn deps(ids: &[NodeId]) -> IndexSet<NodeId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut scheduler = UpdateScheduler::new();

        let id1 = scheduler.add_node(Node::source());
        let id2 = scheduler.add_node(derived());
        scheduler.add_edge(id1, id2);

        assert_eq!(scheduler.node_count(), 2);

        let removed = scheduler.remove_node(id1);
        assert!(removed.is_some());
        assert_eq!(scheduler.node_count(), 1);
        assert!(scheduler.get_node(id1).is_none());
        assert!(scheduler.get_node(id2).unwrap().dependencies().is_empty());
    }

    #[test]
    fn add_and_remove_edges() {
        let mut scheduler = UpdateScheduler::new();

        let source_id = scheduler.add_node(Node::source());
        let derived_id = scheduler.add_node(derived());

        scheduler.add_edge(source_id, derived_id);

        assert!(scheduler
            .get_node(source_id)
            .unwrap()
            .dependents()
            .contains(&derived_id));
        assert!(scheduler
            .get_node(derived_id)
            .unwrap()
            .dependencies()
            .contains(&source_id));

        scheduler.remove_edge(source_id, derived_id);

        assert!(scheduler.get_node(source_id).unwrap().dependents().is_empty());
        assert!(scheduler
            .get_node(derived_id)
            .unwrap()
            .dependencies()
            .is_empty());
    }

    #[test]
    fn edges_to_missing_nodes_are_ignored() {
        let mut scheduler = UpdateScheduler::new();
        let source_id = scheduler.add_node(Node::source());
        scheduler.add_edge(source_id, NodeId::new());
        assert!(scheduler.get_node(source_id).unwrap().dependents().is_empty());
    }

    #[test]
    fn set_dependencies_replaces_edges() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source());
        let b = scheduler.add_node(Node::source());
        let effect = scheduler.add_node(Node::effect(Rc::new(|| {})));

        scheduler.set_dependencies(effect, deps(&[a]));
        assert!(scheduler.get_node(a).unwrap().dependents().contains(&effect));

        scheduler.set_dependencies(effect, deps(&[b]));
        assert!(scheduler.get_node(a).unwrap().dependents().is_empty());
        assert!(scheduler.get_node(b).unwrap().dependents().contains(&effect));

        // Removed nodes keep no edges.
        scheduler.remove_node(effect);
        scheduler.set_dependencies(effect, deps(&[a]));
        assert!(scheduler.get_node(a).unwrap().dependents().is_empty());
    }

    #[test]
    fn mark_changed_propagates() {
        let mut scheduler = UpdateScheduler::new();

        // Create a chain: source -> derived1 -> derived2
        let source_id = scheduler.add_node(Node::source());
        let derived1_id = scheduler.add_node(derived());
        let derived2_id = scheduler.add_node(derived());

        scheduler.add_edge(source_id, derived1_id);
        scheduler.add_edge(derived1_id, derived2_id);

        scheduler.get_node_mut(derived1_id).unwrap().mark_clean();
        scheduler.get_node_mut(derived2_id).unwrap().mark_clean();

        let to_process = scheduler.mark_changed(source_id);
        assert_eq!(to_process.len(), 2);

        // They should be in topological order (derived1 before derived2)
        let pos1 = to_process.iter().position(|&id| id == derived1_id);
        let pos2 = to_process.iter().position(|&id| id == derived2_id);
        assert!(pos1 < pos2);

        let state = |id| scheduler.get_node(id).unwrap().dirty_state();
        assert_eq!(state(derived1_id), DirtyState::Dirty);
        assert_eq!(state(derived2_id), DirtyState::MaybeDirty);
    }

    #[test]
    fn confirm_changed_upgrades_maybe_dirty() {
        let mut scheduler = UpdateScheduler::new();
        let source_id = scheduler.add_node(Node::source());
        let derived_id = scheduler.add_node(derived());
        let effect_id = scheduler.add_node(Node::effect(Rc::new(|| {})));
        scheduler.add_edge(source_id, derived_id);
        scheduler.add_edge(derived_id, effect_id);
        scheduler.get_node_mut(derived_id).unwrap().mark_clean();
        scheduler.get_node_mut(effect_id).unwrap().mark_clean();

        scheduler.mark_changed(source_id);
        assert!(scheduler.is_effect(effect_id));
        assert_eq!(
            scheduler.get_node(effect_id).unwrap().dirty_state(),
            DirtyState::MaybeDirty
        );

        scheduler.confirm_changed(derived_id);
        assert_eq!(
            scheduler.get_node(effect_id).unwrap().dirty_state(),
            DirtyState::Dirty
        );
    }
}

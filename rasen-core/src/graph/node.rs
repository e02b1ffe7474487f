//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::reactive::NodeId;

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (ref). These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Source,

    /// A derived node (computed). These have dependencies and may have
    /// dependents. The cached value lives with the owner, not the graph.
    Derived,

    /// An effect node (watcher). These are leaves of the graph.
    Effect,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// The node might need to recompute. A derived dependency changed
    /// upstream, but we have not yet verified its output is different.
    MaybeDirty,

    /// The node definitely needs to recompute. Its inputs have changed.
    Dirty,
}

/// What the runtime calls to bring a node up to date.
#[derive(Clone)]
pub enum Job {
    /// Refresh a derived value; returns whether the output changed.
    Recompute(Rc<dyn Fn() -> bool>),
    /// Run an effect.
    Run(Rc<dyn Fn()>),
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recompute(_) => f.write_str("Recompute(..)"),
            Self::Run(_) => f.write_str("Run(..)"),
        }
    }
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// What kind of node this is.
    kind: NodeKind,

    /// Current dirty state.
    dirty: DirtyState,

    /// Nodes that this node depends on, in first-read order.
    dependencies: IndexSet<NodeId>,

    /// Nodes that depend on this node, in subscription order.
    dependents: IndexSet<NodeId>,

    job: Option<Job>,
}

impl Node {
    fn new(kind: NodeKind, job: Option<Job>) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            dirty: match kind {
                NodeKind::Source => DirtyState::Clean,
                // Start dirty to ensure first computation
                NodeKind::Derived | NodeKind::Effect => DirtyState::Dirty,
            },
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            job,
        }
    }

    /// Create a new source (ref) node.
    pub fn source() -> Self {
        Self::new(NodeKind::Source, None)
    }

    /// Create a new derived (computed) node.
    pub fn derived(recompute: Rc<dyn Fn() -> bool>) -> Self {
        Self::new(NodeKind::Derived, Some(Job::Recompute(recompute)))
    }

    /// Create a new effect node.
    pub fn effect(run: Rc<dyn Fn()>) -> Self {
        Self::new(NodeKind::Effect, Some(Job::Run(run)))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Mark the node as maybe dirty. A dirty node stays dirty.
    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.shift_remove(&node_id);
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    /// Take the dependency set, leaving it empty.
    pub fn take_dependencies(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.dependencies)
    }
}

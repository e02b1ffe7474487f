//! Dependency Graph
//!
//! This module implements the bundled reactive backend: a dependency graph
//! that tracks relationships between refs, computeds and watchers.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent reactive values (refs) or computations (computeds,
//!   watchers)
//! - Edges represent dependencies: if A depends on B, there is an edge from B
//!   to A
//!
//! When a ref changes, we traverse the graph to find all affected nodes and
//! mark them as dirty. The runtime then determines which dirty nodes
//! actually need to recompute.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized rather than stored on each cell, which gives
//!    topological ordering for batch updates.
//!
//! 2. The graph is indexed by node ID for O(1) lookups.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod context;
mod node;
mod runtime;
mod scheduler;

pub use context::{FrameGuard, TrackingStack};
pub use node::{DirtyState, Job, Node, NodeKind};
pub use runtime::{FlushMode, GraphRuntime, RuntimeConfig};
pub use scheduler::UpdateScheduler;

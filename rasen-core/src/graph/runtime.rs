//! Graph Runtime
//!
//! [`GraphRuntime`] is the bundled [`ReactiveRuntime`] backend. It keeps the
//! dependency graph in an [`UpdateScheduler`], collects dependencies through
//! a [`TrackingStack`] and drains effects from an ordered queue.
//!
//! # How a Write Propagates
//!
//! 1. `trigger(source)` asks the scheduler to mark everything downstream and
//!    queues the affected effects in topological order.
//!
//! 2. With [`FlushMode::Sync`] the queue drains right away, unless a batch
//!    is open or a flush is already running. With [`FlushMode::Batched`] it
//!    waits for an explicit [`flush`](crate::reactive::flush).
//!
//! 3. Each queued effect is checked before it runs. A dirty effect runs; a
//!    maybe-dirty one first refreshes its derived inputs and only runs if
//!    one of them produced a new value.
//!
//! # Re-entrancy
//!
//! User closures (effects, computeds) are always called with every internal
//! borrow released, so they may freely create, read, write and dispose nodes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::context::{FrameGuard, TrackingStack};
use super::node::{DirtyState, Job, Node, NodeKind};
use super::scheduler::UpdateScheduler;
use crate::reactive::{NodeId, ReactiveRuntime};

/// When queued effects run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Run effects as soon as a write completes, outside any batch.
    #[default]
    Sync,
    /// Queue effects until `flush()` is called.
    Batched,
}

/// Configuration for [`GraphRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub flush: FlushMode,
    /// Upper bound on effect runs in one flush. Exceeding it means effects
    /// keep re-triggering each other; the rest of the queue is dropped.
    pub max_flush_iterations: usize,
}

impl RuntimeConfig {
    pub const DEFAULT_MAX_FLUSH_ITERATIONS: usize = 10_000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_mode(mut self, flush: FlushMode) -> Self {
        self.flush = flush;
        self
    }

    pub fn max_flush_iterations(mut self, limit: usize) -> Self {
        self.max_flush_iterations = limit;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush: FlushMode::Sync,
            max_flush_iterations: Self::DEFAULT_MAX_FLUSH_ITERATIONS,
        }
    }
}

#[derive(Debug, Default)]
struct GraphState {
    scheduler: UpdateScheduler,
    queue: IndexSet<NodeId>,
}

/// Push-pull dependency graph backend.
///
/// # Example
///
/// ```rust,ignore
/// use rasen_core::graph::{GraphRuntime, RuntimeConfig, FlushMode};
///
/// rasen_core::reactive::configure(
///     GraphRuntime::with_config(RuntimeConfig::new().flush_mode(FlushMode::Batched)),
/// );
/// ```
#[derive(Debug, Default)]
pub struct GraphRuntime {
    config: RuntimeConfig,
    state: RefCell<GraphState>,
    tracking: RefCell<TrackingStack>,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
}

impl GraphRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    /// Number of effects waiting for a flush.
    pub fn pending_count(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.state.borrow().scheduler.node_count()
    }

    fn add(&self, node: Node) -> NodeId {
        self.state.borrow_mut().scheduler.add_node(node)
    }

    fn dirty_state(&self, id: NodeId) -> Option<(NodeKind, DirtyState)> {
        let state = self.state.borrow();
        let node = state.scheduler.get_node(id)?;
        Some((node.kind(), node.dirty_state()))
    }

    /// Mark the node clean and hand out its job.
    fn claim_job(&self, id: NodeId) -> Option<Job> {
        let mut state = self.state.borrow_mut();
        let node = state.scheduler.get_node_mut(id)?;
        node.mark_clean();
        node.job().cloned()
    }

    /// Run `f` with `id` collecting dependencies, then store them.
    fn collect<R>(&self, id: NodeId, f: impl FnOnce() -> R) -> R {
        let frame = FrameGuard::enter(&self.tracking, Some(id));
        let out = f();
        let dependencies = frame.finish();
        self.state
            .borrow_mut()
            .scheduler
            .set_dependencies(id, dependencies);
        out
    }

    /// Refresh the derived inputs of a maybe-dirty node. Returns whether the
    /// node ended up dirty.
    fn verify_inputs(&self, id: NodeId) -> bool {
        let inputs: Vec<NodeId> = {
            let state = self.state.borrow();
            match state.scheduler.get_node(id) {
                Some(node) => node.dependencies().iter().copied().collect(),
                None => return false,
            }
        };
        for input in inputs {
            if matches!(self.dirty_state(input), Some((NodeKind::Derived, s)) if s != DirtyState::Clean)
            {
                self.refresh(input);
            }
            if matches!(self.dirty_state(id), Some((_, DirtyState::Dirty))) {
                return true;
            }
        }
        if let Some(node) = self.state.borrow_mut().scheduler.get_node_mut(id) {
            node.mark_clean();
        }
        false
    }

    /// Bring a derived node up to date.
    fn refresh(&self, id: NodeId) {
        let dirty = match self.dirty_state(id) {
            Some((NodeKind::Derived, DirtyState::Clean)) | None => return,
            Some((NodeKind::Derived, DirtyState::MaybeDirty)) => self.verify_inputs(id),
            Some((NodeKind::Derived, DirtyState::Dirty)) => true,
            Some(_) => return,
        };
        if !dirty {
            return;
        }
        let Some(Job::Recompute(recompute)) = self.claim_job(id) else {
            return;
        };
        let changed = self.collect(id, || recompute());
        if changed {
            self.state.borrow_mut().scheduler.confirm_changed(id);
        }
    }

    fn needs_run(&self, id: NodeId) -> bool {
        match self.dirty_state(id) {
            Some((NodeKind::Effect, DirtyState::Dirty)) => true,
            Some((NodeKind::Effect, DirtyState::MaybeDirty)) => self.verify_inputs(id),
            _ => false,
        }
    }

    fn run_effect(&self, id: NodeId) {
        let Some(Job::Run(run)) = self.claim_job(id) else {
            return;
        };
        self.collect(id, || run());
    }

    fn should_flush(&self) -> bool {
        self.config.flush == FlushMode::Sync && self.batch_depth.get() == 0 && !self.flushing.get()
    }

    fn drain(&self) {
        if self.flushing.replace(true) {
            return;
        }
        let _guard = FlushingGuard(&self.flushing);

        let mut iterations = 0usize;
        loop {
            let next = self.state.borrow_mut().queue.shift_remove_index(0);
            let Some(id) = next else {
                break;
            };
            iterations += 1;
            if iterations > self.config.max_flush_iterations {
                let dropped = {
                    let mut state = self.state.borrow_mut();
                    let dropped = state.queue.len() + 1;
                    state.queue.clear();
                    dropped
                };
                tracing::warn!(
                    limit = self.config.max_flush_iterations,
                    dropped,
                    "flush iteration limit reached; effects are re-triggering each other"
                );
                break;
            }
            if self.needs_run(id) {
                self.run_effect(id);
            }
        }
        if iterations > 0 {
            tracing::trace!(iterations, "flush complete");
        }
    }
}

impl ReactiveRuntime for GraphRuntime {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn create_source(&self) -> NodeId {
        self.add(Node::source())
    }

    fn create_derived(&self, recompute: Rc<dyn Fn() -> bool>) -> NodeId {
        self.add(Node::derived(recompute))
    }

    fn create_effect(&self, run: Rc<dyn Fn()>) -> NodeId {
        let id = self.add(Node::effect(run));
        self.begin_batch();
        self.run_effect(id);
        self.end_batch();
        id
    }

    fn track(&self, node: NodeId) {
        self.refresh(node);
        self.tracking.borrow_mut().record(node);
    }

    fn trigger(&self, node: NodeId) {
        {
            let mut state = self.state.borrow_mut();
            let touched = state.scheduler.mark_changed(node);
            for id in touched {
                if state.scheduler.is_effect(id) {
                    state.queue.insert(id);
                }
            }
        }
        if self.should_flush() {
            self.drain();
        }
    }

    fn dispose(&self, node: NodeId) {
        let removed = match self.state.try_borrow_mut() {
            Ok(mut state) => {
                state.queue.shift_remove(&node);
                state.scheduler.remove_node(node)
            }
            Err(_) => {
                tracing::warn!(%node, "node disposed while the graph was busy; leaking it");
                None
            }
        };
        // Dropping the job may drop refs, which dispose their own nodes.
        drop(removed);
    }

    fn enter_untracked(&self) {
        self.tracking.borrow_mut().push(None);
    }

    fn exit_untracked(&self) {
        self.tracking.borrow_mut().pop();
    }

    fn begin_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    fn end_batch(&self) {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        if self.should_flush() && self.pending_count() > 0 {
            self.drain();
        }
    }

    fn flush(&self) {
        self.drain();
    }
}

struct FlushingGuard<'a>(&'a Cell<bool>);

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

//! Tracking Context
//!
//! The tracking context records which node is currently running so that
//! reads can be attributed to it.
//!
//! # Implementation
//!
//! The runtime keeps a stack of frames. Running a derived value or an effect
//! pushes a frame naming it as the observer; every read while that frame is
//! on top becomes one of its dependencies. When the computation completes
//! the frame is popped and its dependency set replaces the node's old one.
//!
//! `untracked` pushes a frame with no observer, which hides the frames below
//! it. Nesting works naturally: a computed read inside an effect pushes its
//! own frame on top of the effect's.

use std::cell::RefCell;

use indexmap::IndexSet;

use crate::reactive::NodeId;

#[derive(Debug)]
struct Frame {
    observer: Option<NodeId>,
    dependencies: IndexSet<NodeId>,
}

/// The per-runtime stack of running computations.
#[derive(Debug, Default)]
pub struct TrackingStack {
    frames: Vec<Frame>,
}

impl TrackingStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame. `None` suspends tracking.
    pub fn push(&mut self, observer: Option<NodeId>) {
        self.frames.push(Frame {
            observer,
            dependencies: IndexSet::new(),
        });
    }

    /// Pop the top frame and return the dependencies it collected.
    pub fn pop(&mut self) -> IndexSet<NodeId> {
        self.frames
            .pop()
            .map(|frame| frame.dependencies)
            .unwrap_or_default()
    }

    /// The node currently collecting dependencies, if tracking is on.
    pub fn observer(&self) -> Option<NodeId> {
        self.frames.last().and_then(|frame| frame.observer)
    }

    /// Whether any frame is open.
    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Record a read of `node`. A node never depends on itself.
    pub fn record(&mut self, node: NodeId) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.observer.is_some_and(|observer| observer != node) {
                frame.dependencies.insert(node);
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Guard for an open frame. Dropping it without calling
/// [`finish`](FrameGuard::finish) pops the frame and discards what it
/// collected, so a panicking computation leaves the stack balanced.
pub struct FrameGuard<'a> {
    stack: &'a RefCell<TrackingStack>,
    open: bool,
}

impl<'a> FrameGuard<'a> {
    pub fn enter(stack: &'a RefCell<TrackingStack>, observer: Option<NodeId>) -> Self {
        stack.borrow_mut().push(observer);
        Self { stack, open: true }
    }

    /// Close the frame and return its dependencies.
    pub fn finish(mut self) -> IndexSet<NodeId> {
        self.open = false;
        self.stack.borrow_mut().pop()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if self.open {
            self.stack.borrow_mut().pop();
        }
    }
}

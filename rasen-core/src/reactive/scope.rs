//! Effect Scopes
//!
//! An effect scope is an ownership node for watchers, child scopes and
//! dispose callbacks. Structural primitives open one per mounted branch so
//! that tearing a subtree down stops every subscription it created.
//!
//! # Rules
//!
//! - `run(f)` makes the scope current while `f` executes. Watchers and
//!   scopes created meanwhile are owned by it.
//! - `stop()` marks the scope inactive, then stops its watchers, its child
//!   scopes and runs its dispose callbacks. Only the first call does
//!   anything.
//! - A stopped scope never runs `f` again; `run` returns `None`.
//! - A child that stops on its own detaches from its parent, so long-lived
//!   parents do not accumulate dead children.
//!
//! The current-scope stack is thread local, like the runtime slot.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::effect::WatchStop;
use super::NodeId;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

fn next_scope_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct ScopeInner {
    id: u64,
    active: Cell<bool>,
    parent: RefCell<Option<Weak<ScopeInner>>>,
    watchers: RefCell<IndexMap<NodeId, Rc<WatchStop>>>,
    children: RefCell<IndexMap<u64, EffectScope>>,
    cleanups: RefCell<SmallVec<[Box<dyn FnOnce()>; 2]>>,
}

/// An ownership node for reactive subscriptions.
///
/// # Example
///
/// ```rust,ignore
/// let scope = EffectScope::new();
/// scope.run(|| {
///     watch(count.clone(), |n, _| println!("{n}"), WatchOptions::new())
/// });
///
/// scope.stop(); // the watcher is gone
/// ```
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

/// Non-owning reference to a scope.
#[derive(Clone)]
pub(crate) struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub(crate) fn upgrade(&self) -> Option<EffectScope> {
        self.0.upgrade().map(|inner| EffectScope { inner })
    }
}

impl EffectScope {
    fn detached_inner() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                id: next_scope_id(),
                active: Cell::new(true),
                parent: RefCell::new(None),
                watchers: RefCell::new(IndexMap::new()),
                children: RefCell::new(IndexMap::new()),
                cleanups: RefCell::new(SmallVec::new()),
            }),
        }
    }

    /// Create a scope owned by the current scope, if there is one.
    pub fn new() -> Self {
        match Self::current() {
            Some(parent) => parent.child(),
            None => Self::detached_inner(),
        }
    }

    /// Create a scope that no other scope owns.
    pub fn detached() -> Self {
        Self::detached_inner()
    }

    /// Create a scope owned by this one, regardless of which scope is
    /// current. A child of a stopped scope starts stopped.
    pub fn child(&self) -> Self {
        let child = Self::detached_inner();
        if !self.is_active() {
            child.inner.active.set(false);
            return child;
        }
        *child.inner.parent.borrow_mut() = Some(Rc::downgrade(&self.inner));
        self.inner
            .children
            .borrow_mut()
            .insert(child.inner.id, child.clone());
        child
    }

    /// The innermost scope currently running, if any.
    pub fn current() -> Option<Self> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether the scope has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Run `f` with this scope current.
    ///
    /// Returns `None` without calling `f` if the scope has been stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            return None;
        }
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = PopGuard;
        Some(f())
    }

    /// Stop every watcher and child scope, then run dispose callbacks.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }

        let watchers = std::mem::take(&mut *self.inner.watchers.borrow_mut());
        let watcher_count = watchers.len();
        for (_, watcher) in watchers {
            watcher.stop();
        }

        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for (_, child) in children {
            child.stop();
        }

        let cleanups = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
        for cleanup in cleanups {
            if panic::catch_unwind(AssertUnwindSafe(cleanup)).is_err() {
                tracing::error!(scope = self.inner.id, "scope dispose callback panicked");
            }
        }

        let parent = self.inner.parent.borrow_mut().take();
        if let Some(parent) = parent.and_then(|weak| weak.upgrade()) {
            parent.children.borrow_mut().shift_remove(&self.inner.id);
        }

        tracing::trace!(scope = self.inner.id, watchers = watcher_count, "effect scope stopped");
    }

    /// Register a callback that runs when this scope stops.
    ///
    /// On a stopped scope the callback runs immediately.
    pub fn on_dispose(&self, f: impl FnOnce() + 'static) {
        if !self.is_active() {
            f();
            return;
        }
        self.inner.cleanups.borrow_mut().push(Box::new(f));
    }

    /// Number of live watchers owned directly by this scope.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }

    /// Number of live child scopes.
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Attach a freshly created watcher to the current scope.
    pub(crate) fn adopt_watcher(watcher: Rc<WatchStop>) {
        let Some(scope) = Self::current() else {
            return;
        };
        if !scope.is_active() {
            // The scope stopped itself mid-run; nothing may outlive it.
            watcher.stop();
            return;
        }
        watcher.set_owner(WeakScope(Rc::downgrade(&scope.inner)));
        scope
            .inner
            .watchers
            .borrow_mut()
            .insert(watcher.node(), watcher);
    }

    pub(crate) fn forget_watcher(&self, node: NodeId) {
        self.inner.watchers.borrow_mut().shift_remove(&node);
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("watchers", &self.watcher_count())
            .field("children", &self.child_count())
            .finish()
    }
}

struct PopGuard;

impl Drop for PopGuard {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Create a scope owned by the current scope.
pub fn effect_scope() -> EffectScope {
    EffectScope::new()
}

/// Register `f` to run when the current scope stops.
///
/// Returns `false`, and drops `f` without running it, when no scope is
/// current.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) -> bool {
    match EffectScope::current() {
        Some(scope) => {
            scope.on_dispose(f);
            true
        }
        None => {
            tracing::warn!("on_scope_dispose called with no active effect scope");
            false
        }
    }
}

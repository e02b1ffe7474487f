//! Watcher Implementation
//!
//! A watcher is a subscription: a source, a callback, and options. It is
//! backed by an effect node on the runtime.
//!
//! # How Watchers Work
//!
//! 1. `watch` registers an effect that reads the source. The runtime runs it
//!    once immediately, which records the source's dependencies.
//!
//! 2. With `immediate`, that first run also calls the callback with
//!    `(value, value)` before `watch` returns.
//!
//! 3. Each later run compares the new value with the previous one and calls
//!    the callback with `(new, old)` when they differ. With `deep` the
//!    callback fires on every notification instead, which is how in-place
//!    mutations through [`Ref::update`](super::Ref::update) are observed.
//!
//! 4. The callback runs untracked: reads inside it do not become
//!    dependencies of the watcher.
//!
//! # Ownership
//!
//! A watcher created while an [`EffectScope`] is current belongs to that
//! scope and is stopped, exactly once, when the scope stops. A watcher
//! created outside any scope lives until its [`WatchHandle`] is stopped;
//! dropping the handle does not stop it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::scope::{EffectScope, WeakScope};
use super::{current, untracked, NodeId, ReactiveRuntime, WatchSource};
use crate::error::Result;

/// Watch options.
///
/// Built with chained setters that return a modified copy:
///
/// ```rust,ignore
/// let options = WatchOptions::new().immediate().deep();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    immediate: bool,
    deep: bool,
}

impl WatchOptions {
    /// Default options: lazy, shallow.
    pub const fn new() -> Self {
        Self {
            immediate: false,
            deep: false,
        }
    }

    /// Call the callback with `(value, value)` before `watch` returns.
    pub const fn immediate(self) -> Self {
        Self {
            immediate: true,
            ..self
        }
    }

    /// Call the callback on every notification, even if the value compares
    /// equal.
    pub const fn deep(self) -> Self {
        Self { deep: true, ..self }
    }

    /// Whether `immediate` is set.
    pub const fn is_immediate(&self) -> bool {
        self.immediate
    }

    /// Whether `deep` is set.
    pub const fn is_deep(&self) -> bool {
        self.deep
    }
}

/// Shared stop state for one watcher.
pub(crate) struct WatchStop {
    node: NodeId,
    runtime: Rc<dyn ReactiveRuntime>,
    stopped: Cell<bool>,
    owner: RefCell<Option<WeakScope>>,
}

impl WatchStop {
    pub(crate) fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn set_owner(&self, owner: WeakScope) {
        *self.owner.borrow_mut() = Some(owner);
    }

    /// Tear the watcher down. Only the first call has an effect.
    pub(crate) fn stop(&self) {
        if self.stopped.replace(true) {
            return;
        }
        self.runtime.dispose(self.node);
        let owner = self.owner.borrow_mut().take();
        if let Some(scope) = owner.and_then(|weak| weak.upgrade()) {
            scope.forget_watcher(self.node);
        }
        tracing::trace!(node = %self.node, "watcher stopped");
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// Stop handle returned by [`watch`].
#[derive(Clone)]
pub struct WatchHandle {
    stop: Rc<WatchStop>,
}

impl WatchHandle {
    /// Stop the watcher. Later calls are no-ops.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether the watcher has been stopped, directly or by its scope.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// The effect node backing this watcher.
    pub fn id(&self) -> NodeId {
        self.stop.node()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.stop.node)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Watch `source` and call `callback(new, old)` when it changes.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0)?;
/// let handle = watch(count.clone(), |new, old| {
///     println!("{old} -> {new}");
/// }, WatchOptions::new())?;
///
/// count.set(1); // prints "0 -> 1"
/// handle.stop();
/// ```
pub fn watch<T, S, F>(source: S, callback: F, options: WatchOptions) -> Result<WatchHandle>
where
    T: Clone + PartialEq + 'static,
    S: WatchSource<T> + 'static,
    F: FnMut(&T, &T) + 'static,
{
    let runtime = current()?;
    let previous: RefCell<Option<T>> = RefCell::new(None);
    let callback = RefCell::new(callback);

    let run: Rc<dyn Fn()> = Rc::new(move || {
        let next = source.read();
        let old = previous.borrow_mut().replace(next.clone());
        let old = match old {
            None if options.immediate => next.clone(),
            None => return,
            Some(old) if !options.deep && old == next => return,
            Some(old) => old,
        };
        untracked(|| (&mut *callback.borrow_mut())(&next, &old));
    });

    let node = runtime.create_effect(run);
    let stop = Rc::new(WatchStop {
        node,
        runtime,
        stopped: Cell::new(false),
        owner: RefCell::new(None),
    });
    EffectScope::adopt_watcher(Rc::clone(&stop));
    tracing::trace!(%node, immediate = options.immediate, deep = options.deep, "watcher created");

    Ok(WatchHandle { stop })
}

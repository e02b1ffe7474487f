//! Reactive Runtime
//!
//! The runtime is the pluggable backend that owns dependency tracking. The
//! composition core never tracks dependencies itself: it creates nodes,
//! reports reads and writes, and hands the backend closures to run.
//!
//! # How It Works
//!
//! 1. A [`Ref`](super::Ref) asks the backend for a source node and reports
//!    every read (`track`) and write (`trigger`).
//!
//! 2. A [`Computed`](super::Computed) registers a derived node together with a
//!    `recompute` closure. The backend decides when to call it (lazily on the
//!    next read, or eagerly).
//!
//! 3. A watcher registers an effect node. The backend runs it once
//!    immediately, records what it read, and runs it again whenever one of
//!    those dependencies changes, either synchronously or at the next flush.
//!
//! # Configuration Slot
//!
//! The configured runtime lives in a per-thread slot. All reactive work runs
//! on the single thread that drives the host's event loop, so one slot per
//! UI thread is the unit of configuration. [`configure`] installs a runtime,
//! [`current`] fetches it (failing with [`Error::RuntimeNotConfigured`]) and
//! [`reset`] clears the slot, mostly for tests.
//!
//! Values created against a runtime keep it alive; resetting the slot only
//! affects values created afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use super::NodeId;
use crate::error::{Error, Result};

/// The backend contract consumed by the core.
///
/// The trait is object safe and type erased: typed values live in the core,
/// the backend only sees node ids and closures.
pub trait ReactiveRuntime {
    /// Short backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Register a writable source node.
    fn create_source(&self) -> NodeId;

    /// Register a derived node.
    ///
    /// `recompute` refreshes the cached value and returns whether it changed.
    /// Reads performed while it runs are dependencies of the derived node.
    fn create_derived(&self, recompute: Rc<dyn Fn() -> bool>) -> NodeId;

    /// Register an effect node and run it once before returning.
    ///
    /// Reads performed while `run` executes are its dependencies; the backend
    /// runs it again after any of them is triggered.
    fn create_effect(&self, run: Rc<dyn Fn()>) -> NodeId;

    /// Record a read of `node` by whatever is currently running.
    ///
    /// For derived nodes this also brings the cached value up to date.
    fn track(&self, node: NodeId);

    /// Record a write to `node`.
    fn trigger(&self, node: NodeId);

    /// Drop a node and every edge touching it. Disposing an effect stops it.
    fn dispose(&self, node: NodeId);

    /// Suspend dependency tracking until the matching [`exit_untracked`].
    ///
    /// [`exit_untracked`]: ReactiveRuntime::exit_untracked
    fn enter_untracked(&self);

    /// Resume dependency tracking.
    fn exit_untracked(&self);

    /// Start coalescing writes. Effects triggered inside a batch run when the
    /// outermost batch ends.
    fn begin_batch(&self) {}

    /// End a batch started with [`begin_batch`](ReactiveRuntime::begin_batch).
    fn end_batch(&self) {}

    /// Run every pending effect now.
    fn flush(&self) {}
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<dyn ReactiveRuntime>>> = const { RefCell::new(None) };
}

/// Install `runtime` as this thread's reactive runtime.
///
/// Returns the runtime it replaced, if any.
pub fn configure<R>(runtime: R) -> Option<Rc<dyn ReactiveRuntime>>
where
    R: ReactiveRuntime + 'static,
{
    configure_shared(Rc::new(runtime))
}

/// Install an already shared runtime.
pub fn configure_shared(runtime: Rc<dyn ReactiveRuntime>) -> Option<Rc<dyn ReactiveRuntime>> {
    tracing::debug!(backend = runtime.name(), "configuring reactive runtime");
    CURRENT.with(|slot| slot.borrow_mut().replace(runtime))
}

/// Whether a runtime is configured on this thread.
pub fn is_configured() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}

/// The configured runtime.
pub fn current() -> Result<Rc<dyn ReactiveRuntime>> {
    CURRENT
        .with(|slot| slot.borrow().clone())
        .ok_or(Error::RuntimeNotConfigured)
}

/// Clear this thread's runtime slot.
pub fn reset() -> Option<Rc<dyn ReactiveRuntime>> {
    CURRENT.with(|slot| slot.borrow_mut().take())
}

/// Run `f` without recording dependencies.
///
/// Without a configured runtime nothing is tracked anyway, so `f` simply
/// runs.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    match current() {
        Ok(runtime) => {
            runtime.enter_untracked();
            let _guard = UntrackedGuard(&*runtime);
            f()
        }
        Err(_) => f(),
    }
}

/// Run `f` with writes coalesced; triggered effects run once it returns.
pub fn batch<R>(f: impl FnOnce() -> R) -> Result<R> {
    let runtime = current()?;
    runtime.begin_batch();
    let _guard = BatchGuard(&*runtime);
    Ok(f())
}

/// Run every effect the backend has queued.
pub fn flush() -> Result<()> {
    current()?.flush();
    Ok(())
}

struct UntrackedGuard<'a>(&'a dyn ReactiveRuntime);

impl Drop for UntrackedGuard<'_> {
    fn drop(&mut self) {
        self.0.exit_untracked();
    }
}

struct BatchGuard<'a>(&'a dyn ReactiveRuntime);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.0.end_batch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct MockRuntime {
        untracked_depth: Cell<i32>,
        batches: Cell<i32>,
        flushes: Cell<i32>,
    }

    impl ReactiveRuntime for MockRuntime {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn create_source(&self) -> NodeId {
            NodeId::new()
        }

        fn create_derived(&self, _recompute: Rc<dyn Fn() -> bool>) -> NodeId {
            NodeId::new()
        }

        fn create_effect(&self, run: Rc<dyn Fn()>) -> NodeId {
            run();
            NodeId::new()
        }

        fn track(&self, _node: NodeId) {}

        fn trigger(&self, _node: NodeId) {}

        fn dispose(&self, _node: NodeId) {}

        fn enter_untracked(&self) {
            self.untracked_depth.set(self.untracked_depth.get() + 1);
        }

        fn exit_untracked(&self) {
            self.untracked_depth.set(self.untracked_depth.get() - 1);
        }

        fn begin_batch(&self) {
            self.batches.set(self.batches.get() + 1);
        }

        fn flush(&self) {
            self.flushes.set(self.flushes.get() + 1);
        }
    }

    #[test]
    fn slot_starts_empty_and_resets() {
        reset();
        assert!(!is_configured());
        assert_eq!(current().err(), Some(Error::RuntimeNotConfigured));

        configure(MockRuntime::default());
        assert!(is_configured());
        assert_eq!(current().map(|rt| rt.name()).ok(), Some("mock"));

        assert!(reset().is_some());
        assert!(!is_configured());
    }

    #[test]
    fn configure_returns_previous_runtime() {
        reset();
        assert!(configure(MockRuntime::default()).is_none());
        let previous = configure(MockRuntime::default());
        assert_eq!(previous.map(|rt| rt.name()), Some("mock"));
        reset();
    }

    #[test]
    fn batch_and_flush_require_runtime() {
        reset();
        assert_eq!(batch(|| 1).err(), Some(Error::RuntimeNotConfigured));
        assert_eq!(flush().err(), Some(Error::RuntimeNotConfigured));
        // untracked passes straight through.
        assert_eq!(untracked(|| 7), 7);
    }

    #[test]
    fn untracked_balances_enter_and_exit() {
        reset();
        let runtime = Rc::new(MockRuntime::default());
        configure_shared(runtime.clone());

        let depth_inside = untracked(|| runtime.untracked_depth.get());
        assert_eq!(depth_inside, 1);
        assert_eq!(runtime.untracked_depth.get(), 0);

        assert_eq!(batch(|| 3), Ok(3));
        assert_eq!(runtime.batches.get(), 1);

        flush().unwrap();
        assert_eq!(runtime.flushes.get(), 1);
        reset();
    }
}

//! Computed Implementation
//!
//! A [`Computed`] is a read-only derived cell. It caches the result of a
//! computation and hands the runtime a `recompute` closure; the runtime
//! decides when the cache is refreshed.
//!
//! # How Computeds Work
//!
//! 1. Creating a computed registers a derived node with the runtime. Nothing
//!    is computed yet.
//!
//! 2. Reading it asks the runtime to track the node. A dirty node is
//!    recomputed first, with the computation's own reads recorded as the
//!    node's dependencies.
//!
//! 3. `recompute` reports a change only when the new value differs from the
//!    cached one, so dependents of a computed that lands on the same value
//!    are not re-run by backends that check.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{current, untracked, NodeId, ReactiveRuntime};
use crate::error::Result;

struct ComputedInner<T> {
    node: NodeId,
    value: RefCell<Option<T>>,
    compute: Box<dyn Fn() -> T>,
    runtime: Rc<dyn ReactiveRuntime>,
}

impl<T: PartialEq> ComputedInner<T> {
    fn recompute(&self) -> bool {
        let next = (self.compute)();
        let mut slot = self.value.borrow_mut();
        if slot.as_ref() == Some(&next) {
            return false;
        }
        *slot = Some(next);
        true
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.runtime.dispose(self.node);
    }
}

/// A read-only derived reactive cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(2)?;
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// })?;
///
/// assert_eq!(doubled.get(), 4);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: PartialEq + 'static> Computed<T> {
    /// Create a computed on the configured runtime.
    pub fn new<F>(compute: F) -> Result<Self>
    where
        F: Fn() -> T + 'static,
    {
        let runtime = current()?;
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let recompute: Rc<dyn Fn() -> bool> = Rc::new(move || match weak.upgrade() {
                Some(inner) => inner.recompute(),
                None => false,
            });
            ComputedInner {
                node: runtime.create_derived(recompute),
                value: RefCell::new(None),
                compute: Box::new(compute),
                runtime: Rc::clone(&runtime),
            }
        });
        Ok(Self { inner })
    }

    /// The node backing this computed.
    pub fn id(&self) -> NodeId {
        self.inner.node
    }

    /// Read the value through `f`, recording a dependency.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.runtime.track(self.inner.node);
        {
            let slot = self.inner.value.borrow();
            if let Some(value) = slot.as_ref() {
                return f(value);
            }
        }
        // A backend that never refreshed the node still gets a correct read.
        let fresh = (self.inner.compute)();
        let out = f(&fresh);
        *self.inner.value.borrow_mut() = Some(fresh);
        out
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Get the current value, recording a dependency.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        untracked(|| self.get())
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.node)
            .field("cached", &*self.inner.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphRuntime;
    use crate::reactive::{configure, Ref};
    use std::cell::Cell;

    fn setup() {
        configure(GraphRuntime::new());
    }

    #[test]
    fn computed_is_lazy() {
        setup();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let value = Computed::new(move || {
            runs_clone.set(runs_clone.get() + 1);
            42
        })
        .unwrap();

        assert_eq!(runs.get(), 0, "nothing computed before the first read");
        assert_eq!(value.get(), 42);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn computed_caches_until_dependency_changes() {
        setup();
        let base = Ref::new(5).unwrap();
        let runs = Rc::new(Cell::new(0));

        let doubled = {
            let base = base.clone();
            let runs = runs.clone();
            Computed::new(move || {
                runs.set(runs.get() + 1);
                base.get() * 2
            })
            .unwrap()
        };

        assert_eq!(doubled.get(), 10);
        assert_eq!(doubled.get(), 10);
        assert_eq!(runs.get(), 1, "second read served from cache");

        base.set(10);
        assert_eq!(doubled.get(), 20);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn computed_depends_on_computed() {
        setup();
        let base = Ref::new(5).unwrap();
        let doubled = {
            let base = base.clone();
            Computed::new(move || base.get() * 2).unwrap()
        };
        let plus_ten = {
            let doubled = doubled.clone();
            Computed::new(move || doubled.get() + 10).unwrap()
        };

        assert_eq!(plus_ten.get(), 20);
        base.set(10);
        assert_eq!(plus_ten.get(), 30);
        assert_eq!(doubled.get_untracked(), 20);
    }
}

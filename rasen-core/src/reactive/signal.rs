//! Ref Implementation
//!
//! A [`Ref`] is the mutable reactive cell. It holds a value and reports
//! reads and writes to the runtime it was created on.
//!
//! # How Refs Work
//!
//! 1. Creating a ref asks the configured runtime for a source node.
//!
//! 2. Reading it inside a running effect or derived value records a
//!    dependency on that node.
//!
//! 3. Writing it triggers the node, and the runtime schedules every
//!    dependent.
//!
//! # Identity
//!
//! Clones share the same cell: every clone reads and writes the same value
//! and the same node. [`Ref::ptr_eq`] compares identity. The node is disposed
//! when the last clone is dropped.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{current, NodeId, ReactiveRuntime};
use crate::error::Result;

struct RefInner<T> {
    node: NodeId,
    value: RefCell<T>,
    runtime: Rc<dyn ReactiveRuntime>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        self.runtime.dispose(self.node);
    }
}

/// A mutable reactive cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0)?;
///
/// let value = count.get();
/// count.set(5);
/// count.update(|n| *n += 1);
/// ```
pub struct Ref<T: 'static> {
    inner: Rc<RefInner<T>>,
}

impl<T: 'static> Ref<T> {
    /// Create a ref on the configured runtime.
    pub fn new(value: T) -> Result<Self> {
        let runtime = current()?;
        let node = runtime.create_source();
        Ok(Self {
            inner: Rc::new(RefInner {
                node,
                value: RefCell::new(value),
                runtime,
            }),
        })
    }

    /// The node backing this ref.
    pub fn id(&self) -> NodeId {
        self.inner.node
    }

    /// Read the value through `f`, recording a dependency.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.runtime.track(self.inner.node);
        f(&self.inner.value.borrow())
    }

    /// Read the value through `f` without recording a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value and notify dependents.
    ///
    /// Dependents are notified even when the new value equals the old one;
    /// use [`set_if_changed`](Ref::set_if_changed) to skip that.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.inner.value.borrow_mut();
            *guard = value;
        }
        self.inner.runtime.trigger(self.inner.node);
    }

    /// Mutate the value in place and notify dependents.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut guard = self.inner.value.borrow_mut();
            f(&mut guard);
        }
        self.inner.runtime.trigger(self.inner.node);
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Ref<T> {
    /// Get the current value, recording a dependency.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: PartialEq + 'static> Ref<T> {
    /// Replace the value only if it differs. Returns whether it changed.
    pub fn set_if_changed(&self, value: T) -> bool {
        if *self.inner.value.borrow() == value {
            return false;
        }
        self.set(value);
        true
    }
}

impl<T: 'static> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.node)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

//! Possibly-reactive values.
//!
//! Component props are often "a value or something reactive that yields a
//! value". [`MaybeRef`] carries either, [`unref`] reads through it and
//! [`is_ref`] tells the two apart. [`WatchSource`] is the common read
//! interface that watchers and structural primitives accept.

use std::fmt;
use std::rc::Rc;

use super::{Computed, Ref};

/// A plain value, a reactive cell, or a getter.
pub enum MaybeRef<T: 'static> {
    /// Plain value; never changes.
    Static(T),
    /// Mutable reactive cell.
    Ref(Ref<T>),
    /// Derived reactive cell.
    Computed(Computed<T>),
    /// Getter evaluated on every read; reactive if it reads reactive cells.
    Getter(Rc<dyn Fn() -> T>),
}

impl<T: Clone + PartialEq + 'static> MaybeRef<T> {
    /// Wrap a getter closure.
    pub fn from_fn(getter: impl Fn() -> T + 'static) -> Self {
        Self::Getter(Rc::new(getter))
    }

    /// Read the current value, recording a dependency when reactive.
    pub fn get(&self) -> T {
        match self {
            Self::Static(value) => value.clone(),
            Self::Ref(cell) => cell.get(),
            Self::Computed(cell) => cell.get(),
            Self::Getter(getter) => getter(),
        }
    }

    /// Whether this wraps a reactive cell.
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_) | Self::Computed(_))
    }
}

/// Read through a possibly-reactive value.
pub fn unref<T: Clone + PartialEq + 'static>(value: &MaybeRef<T>) -> T {
    value.get()
}

/// Whether a possibly-reactive value is a reactive cell.
pub fn is_ref<T: Clone + PartialEq + 'static>(value: &MaybeRef<T>) -> bool {
    value.is_ref()
}

impl<T: 'static> Clone for MaybeRef<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Static(value) => Self::Static(value.clone()),
            Self::Ref(cell) => Self::Ref(cell.clone()),
            Self::Computed(cell) => Self::Computed(cell.clone()),
            Self::Getter(getter) => Self::Getter(Rc::clone(getter)),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for MaybeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Ref(cell) => f.debug_tuple("Ref").field(cell).finish(),
            Self::Computed(cell) => f.debug_tuple("Computed").field(cell).finish(),
            Self::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

impl<T: 'static> From<T> for MaybeRef<T> {
    fn from(value: T) -> Self {
        Self::Static(value)
    }
}

impl<T: 'static> From<Ref<T>> for MaybeRef<T> {
    fn from(cell: Ref<T>) -> Self {
        Self::Ref(cell)
    }
}

impl<T: 'static> From<Computed<T>> for MaybeRef<T> {
    fn from(cell: Computed<T>) -> Self {
        Self::Computed(cell)
    }
}

/// Anything a watcher can read.
///
/// Implemented for [`Ref`], [`Computed`], [`MaybeRef`] and getter closures.
pub trait WatchSource<T> {
    /// Read the current value; reads of reactive cells are tracked.
    fn read(&self) -> T;
}

impl<T: Clone + 'static> WatchSource<T> for Ref<T> {
    fn read(&self) -> T {
        self.get()
    }
}

impl<T: Clone + PartialEq + 'static> WatchSource<T> for Computed<T> {
    fn read(&self) -> T {
        self.get()
    }
}

impl<T: Clone + PartialEq + 'static> WatchSource<T> for MaybeRef<T> {
    fn read(&self) -> T {
        self.get()
    }
}

impl<T, F> WatchSource<T> for F
where
    F: Fn() -> T,
{
    fn read(&self) -> T {
        self()
    }
}

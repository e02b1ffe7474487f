//! Reactive Primitives
//!
//! This module is the reactive surface the composition layer is written
//! against: refs, computeds, watchers and effect scopes. None of them track
//! dependencies themselves. They delegate to a pluggable [`ReactiveRuntime`]
//! installed per thread with [`configure`].
//!
//! # Concepts
//!
//! ## Refs
//!
//! A [`Ref`] is a container for mutable state. Reading it inside a watcher
//! or computed records a dependency; writing it notifies every dependent.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value that caches its result and only
//! re-evaluates when one of its dependencies changed.
//!
//! ## Watchers
//!
//! [`watch`] calls a callback with `(new, old)` whenever its source changes.
//! It is the only way the composition layer reacts to state.
//!
//! ## Effect Scopes
//!
//! An [`EffectScope`] owns the watchers created while it runs. Stopping it
//! stops all of them, which is how unmounting a subtree releases its
//! subscriptions.
//!
//! # Backends
//!
//! [`crate::graph::GraphRuntime`] is the bundled backend. Any type
//! implementing [`ReactiveRuntime`] can replace it.

mod effect;
mod id;
mod memo;
mod runtime;
mod scope;
mod signal;
mod value;

pub use effect::{watch, WatchHandle, WatchOptions};
pub use id::NodeId;
pub use memo::Computed;
pub use runtime::{
    batch, configure, configure_shared, current, flush, is_configured, reset, untracked,
    ReactiveRuntime,
};
pub use scope::{effect_scope, on_scope_dispose, EffectScope};
pub use signal::Ref;
pub use value::{is_ref, unref, MaybeRef, WatchSource};

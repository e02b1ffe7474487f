//! Rasen Core
//!
//! This crate provides the host-agnostic core of the Rasen reactive UI
//! framework. It implements:
//!
//! - A pluggable reactive runtime interface, with refs, computeds and watchers
//! - Effect scopes that own watchers and release them together
//! - The Mountable component contract
//! - Structural primitives: fragment, when, each/repeat, switch_case, lazy
//! - The host adapter protocol that rendering targets implement
//!
//! Nothing here knows what a "host" is. A rendering target supplies a
//! [`Host`] with four ordering operations, and every primitive reduces
//! reactive changes to calls on it.
//!
//! # Architecture
//!
//! - `reactive`: runtime slot, refs, computeds, watchers and effect scopes
//! - `graph`: a push-pull dependency graph backend for the runtime slot
//! - `host`: the host adapter trait and an in-memory host
//! - `component`: Mountables, components and the structural primitives
//!
//! # Example
//!
//! ```rust,ignore
//! use rasen_core::component::{each, mount_root};
//! use rasen_core::graph::GraphRuntime;
//! use rasen_core::host::{text_with, MemoryHost};
//! use rasen_core::reactive::{configure, Ref};
//!
//! configure(GraphRuntime::new());
//!
//! let items = Ref::new(vec![1, 2, 3])?;
//! let host = MemoryHost::new();
//! let _root = mount_root(
//!     each(items.clone(), |item, _index| text_with(move || item.get().to_string())),
//!     &host,
//! )?;
//!
//! items.set(vec![3, 1, 2]);
//! // One marker moved; nothing re-rendered.
//! assert_eq!(host.render(), "312");
//! ```

pub mod component;
pub mod graph;
pub mod host;
pub mod reactive;

mod error;

pub use component::{mount_root, MountHandle, Mountable, Unmount};
pub use error::{report, set_error_handler, take_error_handler, Error, Result};
pub use host::{Host, HostCapabilities};
pub use reactive::{watch, Computed, EffectScope, Ref, WatchOptions};

//! Components and Structural Primitives
//!
//! Every component reduces to a [`Mountable`]: a one-shot function from a
//! host to an optional [`Unmount`]. Structural primitives are Mountables that
//! own other Mountables and re-mount them as reactive state changes.
//!
//! # Lifecycle
//!
//! 1. **Setup.** A component's body runs once. It creates refs and
//!    computeds and returns the Mountable describing what to render.
//!
//! 2. **Mount.** The Mountable is invoked exactly once with a host. Watchers
//!    it creates are owned by the effect scope current at that moment.
//!
//! 3. **Unmount.** The returned cleanup is invoked exactly once. It stops
//!    the scopes the Mountable opened and removes what it put on the host.
//!
//! # Primitives
//!
//! - [`fragment`]: ordered composition
//! - [`when`] / [`When`]: binary conditional
//! - [`each`] / [`each_keyed`] / [`repeat`]: keyed list reconciliation
//! - [`switch_case`] / [`SwitchCase`]: multi-way keyed branch
//! - [`lazy`] / [`Lazy`]: branch resolved from a future

mod branch;
mod each;
mod fragment;
mod lazy;
mod slot;
mod switch;
mod when;

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::error::Result;
use crate::host::Host;
use crate::reactive::EffectScope;

pub use each::{each, each_keyed, repeat};
pub use fragment::fragment;
pub use lazy::{lazy, Lazy, LazyOptions, LazyState};
pub use switch::{switch_case, SwitchCase};
pub use when::{when, when_else, When};

/// Cleanup returned by a mount. Must be invoked at most once.
pub type Unmount = Box<dyn FnOnce()>;

/// A factory producing a fresh Mountable each time a branch is mounted.
pub type Factory<H> = Rc<dyn Fn() -> Mountable<H>>;

/// A one-shot mount function.
///
/// # Example
///
/// ```rust,ignore
/// let label = Mountable::new(|host: &MemoryHost| {
///     let node = host.append_text("hi");
///     let host = host.clone();
///     Ok(Some(Box::new(move || host.remove_text(node)) as Unmount))
/// });
/// ```
pub struct Mountable<H> {
    mount: Box<dyn FnOnce(&H) -> Result<Option<Unmount>>>,
}

impl<H: 'static> Mountable<H> {
    pub fn new<F>(mount: F) -> Self
    where
        F: FnOnce(&H) -> Result<Option<Unmount>> + 'static,
    {
        Self {
            mount: Box::new(mount),
        }
    }

    /// A Mountable whose mount cannot fail.
    pub fn from_fn<F>(mount: F) -> Self
    where
        F: FnOnce(&H) -> Option<Unmount> + 'static,
    {
        Self::new(move |host| Ok(mount(host)))
    }

    /// Mounts nothing and returns no cleanup.
    pub fn empty() -> Self {
        Self::new(|_| Ok(None))
    }

    /// Mount against `host`.
    pub fn mount(self, host: &H) -> Result<Option<Unmount>> {
        (self.mount)(host)
    }
}

impl<H> fmt::Debug for Mountable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Mountable(..)")
    }
}

/// Run an unmount, logging instead of propagating a panic so that sibling
/// cleanups still run.
pub(crate) fn run_unmount(unmount: Unmount) {
    if panic::catch_unwind(AssertUnwindSafe(unmount)).is_err() {
        tracing::error!("unmount panicked; continuing teardown");
    }
}

/// Wrap a component body.
///
/// On mount, an effect scope is opened and `setup` runs inside it. The
/// Mountable it returns is mounted in the same scope, and the unmount also
/// stops the scope, so every watcher the component created goes with it.
///
/// # Example
///
/// ```rust,ignore
/// let counter = component(|| {
///     let count = Ref::new(0)?;
///     Ok(text_with({
///         let count = count.clone();
///         move || count.get().to_string()
///     }))
/// });
/// ```
pub fn component<H, F>(setup: F) -> Mountable<H>
where
    H: Host,
    F: FnOnce() -> Result<Mountable<H>> + 'static,
{
    Mountable::new(move |host: &H| {
        let scope = EffectScope::new();
        let mounted = scope.run(|| setup().and_then(|mountable| mountable.mount(host)));
        match mounted {
            Some(Ok(unmount)) => {
                tracing::trace!("component mounted");
                let cleanup: Unmount = Box::new(move || {
                    scope.stop();
                    if let Some(unmount) = unmount {
                        run_unmount(unmount);
                    }
                });
                Ok(Some(cleanup))
            }
            Some(Err(err)) => {
                scope.stop();
                Err(err)
            }
            // Created inside a scope that is already stopping.
            None => Ok(None),
        }
    })
}

/// Wrap an asynchronous component.
///
/// Equivalent to [`lazy`] without loading or error branches.
pub fn async_component<H, F, Fut>(setup: F) -> Mountable<H>
where
    H: Host,
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = Result<Mountable<H>>> + 'static,
{
    Lazy::new(setup).build()
}

/// Handle to a mounted root.
///
/// Unmounts when dropped.
pub struct MountHandle {
    scope: EffectScope,
    unmount: Option<Unmount>,
    mounted: bool,
}

impl MountHandle {
    /// Unmount now. Later calls, and the drop, do nothing.
    pub fn unmount(&mut self) {
        if !std::mem::replace(&mut self.mounted, false) {
            return;
        }
        self.scope.stop();
        if let Some(unmount) = self.unmount.take() {
            run_unmount(unmount);
        }
        tracing::trace!("root unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// The scope owning everything mounted under this root.
    pub fn scope(&self) -> &EffectScope {
        &self.scope
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountHandle")
            .field("mounted", &self.mounted)
            .finish()
    }
}

/// Mount `root` into `host` under a fresh detached scope.
pub fn mount_root<H: Host>(root: Mountable<H>, host: &H) -> Result<MountHandle> {
    let scope = EffectScope::detached();
    let unmount = match scope.run(|| root.mount(host)) {
        Some(Ok(unmount)) => unmount,
        Some(Err(err)) => {
            scope.stop();
            return Err(err);
        }
        None => None,
    };
    tracing::trace!("root mounted");
    Ok(MountHandle {
        scope,
        unmount,
        mounted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphRuntime;
    use crate::host::{text, MemoryHost};
    use crate::reactive::{configure, on_scope_dispose, watch, Ref, WatchOptions};
    use crate::Error;
    use std::cell::Cell;

    #[test]
    fn empty_mounts_nothing() {
        let host = MemoryHost::new();
        assert!(Mountable::<MemoryHost>::empty().mount(&host).unwrap().is_none());
        assert_eq!(host.mutation_count(), 0);
    }

    #[test]
    fn component_scope_owns_watchers() {
        configure(GraphRuntime::new());
        let host = MemoryHost::new();
        let source = Ref::new(0).unwrap();
        let calls = Rc::new(Cell::new(0));

        let mountable = {
            let source = source.clone();
            let calls = calls.clone();
            component(move || {
                watch(
                    source,
                    move |_: &i32, _: &i32| calls.set(calls.get() + 1),
                    WatchOptions::new(),
                )?;
                Ok(text("body"))
            })
        };

        let unmount = mountable.mount(&host).unwrap().unwrap();
        source.set(1);
        assert_eq!(calls.get(), 1);
        assert_eq!(host.texts(), vec!["body"]);

        unmount();
        source.set(2);
        assert_eq!(calls.get(), 1, "watcher stopped with the component");
        assert!(host.texts().is_empty());
    }

    #[test]
    fn component_setup_error_surfaces() {
        let host = MemoryHost::new();
        let disposed = Rc::new(Cell::new(false));
        let mountable: Mountable<MemoryHost> = {
            let disposed = disposed.clone();
            component(move || {
                on_scope_dispose(move || disposed.set(true));
                Err(Error::RuntimeNotConfigured)
            })
        };
        assert_eq!(mountable.mount(&host).err(), Some(Error::RuntimeNotConfigured));
        assert!(disposed.get(), "scope stopped on failure");
    }

    #[test]
    fn panicking_unmount_is_contained() {
        let ran_after = Rc::new(Cell::new(false));
        run_unmount(Box::new(|| panic!("boom")));
        let flag = ran_after.clone();
        run_unmount(Box::new(move || flag.set(true)));
        assert!(ran_after.get());
    }

    #[test]
    fn mount_handle_unmounts_once_and_on_drop() {
        let host = MemoryHost::new();
        let count = Rc::new(Cell::new(0));
        let counted = |count: Rc<Cell<i32>>| {
            Mountable::<MemoryHost>::from_fn(move |_| {
                Some(Box::new(move || count.set(count.get() + 1)) as Unmount)
            })
        };

        let mut handle = mount_root(counted(count.clone()), &host).unwrap();
        assert!(handle.is_mounted());
        handle.unmount();
        handle.unmount();
        drop(handle);
        assert_eq!(count.get(), 1);

        {
            let _handle = mount_root(counted(count.clone()), &host).unwrap();
        }
        assert_eq!(count.get(), 2);
    }
}

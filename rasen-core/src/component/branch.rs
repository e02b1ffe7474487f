//! Single-branch switching shared by `when` and `switch_case`.
//!
//! # How Switching Works
//!
//! 1. On mount, the primitive appends a region marker to its host and opens
//!    an effect scope. Branches mount inside the region, so they always sit
//!    where the primitive was placed among its siblings.
//!
//! 2. The discriminant is read once, untracked, and the matching branch is
//!    mounted. Failure here fails the mount.
//!
//! 3. A watcher on the discriminant re-selects on change. The same value is
//!    a no-op. Otherwise the branch is resolved *before* anything is torn
//!    down, so an unresolvable value leaves the old branch in place and the
//!    error goes to the error handler.
//!
//! 4. Without caching, the old branch is fully unmounted before the new one
//!    mounts. With caching, the old branch is hidden and a branch that was
//!    mounted before is shown again instead of being re-created.

use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use super::slot::{MountedBranch, Placement};
use super::{Factory, Unmount};
use crate::error::{report, Error, Result};
use crate::host::Host;
use crate::reactive::{untracked, watch, EffectScope, WatchOptions};

pub(crate) struct BranchSwitch<K, H: Host> {
    host: H,
    scope: EffectScope,
    cached: bool,
    active: Option<K>,
    current: Option<MountedBranch<H>>,
    cache: IndexMap<K, MountedBranch<H>>,
}

impl<K, H> BranchSwitch<K, H>
where
    K: Clone + Eq + Hash + Debug,
    H: Host,
{
    pub(crate) fn new(host: H, scope: EffectScope, cached: bool) -> Self {
        Self {
            host,
            scope,
            cached,
            active: None,
            current: None,
            cache: IndexMap::new(),
        }
    }

    /// Make `key` the active branch.
    ///
    /// `resolve` maps a key to its factory; `Ok(None)` means "render
    /// nothing" and an error means the key has no branch at all.
    pub(crate) fn select(
        &mut self,
        key: K,
        resolve: impl FnOnce(&K) -> Result<Option<Factory<H>>>,
    ) -> Result<()> {
        if self.active.as_ref() == Some(&key) {
            return Ok(());
        }
        let factory = resolve(&key)?;
        tracing::trace!(?key, cached = self.cached, "switching branch");
        if self.cached {
            self.select_cached(key, factory)
        } else {
            self.select_fresh(key, factory)
        }
    }

    fn select_fresh(&mut self, key: K, factory: Option<Factory<H>>) -> Result<()> {
        if let Some(previous) = self.current.take() {
            previous.unmount();
        }
        self.active = None;
        if let Some(factory) = factory {
            let branch =
                MountedBranch::mount(&self.host, &self.scope, factory(), Placement::Append)?;
            self.current = Some(branch);
        }
        self.active = Some(key);
        Ok(())
    }

    fn select_cached(&mut self, key: K, factory: Option<Factory<H>>) -> Result<()> {
        if let Some(previous) = self.active.take().and_then(|k| self.cache.get(&k)) {
            previous.set_hidden(true);
        }
        if let Some(branch) = self.cache.get(&key) {
            branch.set_hidden(false);
        } else if let Some(factory) = factory {
            let branch =
                MountedBranch::mount(&self.host, &self.scope, factory(), Placement::Append)?;
            self.cache.insert(key.clone(), branch);
        }
        self.active = Some(key);
        Ok(())
    }

    /// Unmount every branch, live or cached, in mount order.
    pub(crate) fn teardown(&mut self) {
        if let Some(current) = self.current.take() {
            current.unmount();
        }
        for (_, branch) in self.cache.drain(..) {
            branch.unmount();
        }
        self.active = None;
    }

    #[cfg(test)]
    pub(crate) fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

/// Mount a switching region driven by `source`.
pub(crate) fn mount_switch<K, H, S, R>(
    host: &H,
    source: S,
    cached: bool,
    resolve: R,
) -> Result<Option<Unmount>>
where
    K: Clone + Eq + Hash + Debug + 'static,
    H: Host,
    S: Fn() -> K + 'static,
    R: Fn(&K) -> Result<Option<Factory<H>>> + 'static,
{
    if cached && !host.capabilities().supports_hide_show() {
        return Err(Error::Unsupported {
            capability: "hide/show",
        });
    }

    let region = host.create_marker();
    host.append_marker(&region);
    let scope = EffectScope::new();
    let state = Rc::new(RefCell::new(BranchSwitch::new(
        host.slot(&region),
        scope.clone(),
        cached,
    )));
    let resolve = Rc::new(resolve);

    let teardown = {
        let host = host.clone();
        let scope = scope.clone();
        let state = Rc::clone(&state);
        move || {
            scope.stop();
            state.borrow_mut().teardown();
            host.remove_marker(&region);
        }
    };

    let initial = untracked(&source);
    let first = state.borrow_mut().select(initial, |key| resolve(key));
    if let Err(err) = first {
        teardown();
        return Err(err);
    }

    let watcher = scope.run(|| {
        let state = Rc::clone(&state);
        let resolve = Rc::clone(&resolve);
        watch(
            source,
            move |next: &K, _: &K| {
                let Ok(mut switch) = state.try_borrow_mut() else {
                    tracing::warn!(key = ?next, "branch switch re-entered; update skipped");
                    return;
                };
                if let Err(err) = switch.select(next.clone(), |key| resolve(key)) {
                    report(err);
                }
            },
            WatchOptions::new(),
        )
    });
    if let Some(Err(err)) = watcher {
        teardown();
        return Err(err);
    }

    Ok(Some(Box::new(teardown)))
}

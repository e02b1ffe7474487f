//! Async-resolved branch.
//!
//! # How Lazy Works
//!
//! 1. On mount, a region marker is appended and the `loading` branch (if
//!    any) mounts inside it. The loader future is created right away and
//!    handed to a local tokio task.
//!
//! 2. The task races the loader against `timeout`, then waits until
//!    `min_delay` has passed since mount. A timeout settles as
//!    [`Error::Timeout`].
//!
//! 3. Settlement is one-way: `Loading` becomes `Loaded` or `Errored`, and
//!    the loading branch is replaced by the loaded branch or the `error`
//!    branch. A failure with no `error` branch is logged and the current
//!    view is kept.
//!
//! 4. Unmount clears a liveness flag. The task is not cancelled, but once
//!    the flag is cleared it settles without touching the host.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::slot::{MountedBranch, Placement};
use super::{Factory, Mountable, Unmount};
use crate::error::{report, Error, Result};
use crate::host::Host;
use crate::reactive::{EffectScope, Ref};

/// Where a lazy branch is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LazyState {
    #[default]
    Loading,
    Loaded,
    Errored(Error),
}

impl LazyState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, LazyState::Loading)
    }
}

/// Timing options for [`Lazy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyOptions {
    /// Keep the loading branch up at least this long after mount.
    pub min_delay: Option<Duration>,
    /// Give up on the loader after this long.
    pub timeout: Option<Duration>,
}

impl LazyOptions {
    pub const fn new() -> Self {
        Self {
            min_delay: None,
            timeout: None,
        }
    }

    pub const fn min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = Some(delay);
        self
    }

    pub const fn timeout(mut self, after: Duration) -> Self {
        self.timeout = Some(after);
        self
    }
}

type Loader<H> = Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<Mountable<H>>>>;
type ErrorFactory<H> = Rc<dyn Fn(&Error) -> Mountable<H>>;

/// Builder for an async-resolved branch.
///
/// Mounting needs a tokio `LocalSet`: the loader runs on a local task.
///
/// # Example
///
/// ```rust,ignore
/// let view = lazy(|| async { Ok(load_settings().await?) })
///     .loading(|| text("loading..."))
///     .error(|err| text(format!("failed: {err}")))
///     .timeout(Duration::from_secs(5))
///     .build();
/// ```
pub struct Lazy<H> {
    loader: Loader<H>,
    loading: Option<Factory<H>>,
    error: Option<ErrorFactory<H>>,
    options: LazyOptions,
    state: Option<Ref<LazyState>>,
}

impl<H: Host> Lazy<H> {
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Result<Mountable<H>>> + 'static,
    {
        Self {
            loader: Box::new(move || loader().boxed_local()),
            loading: None,
            error: None,
            options: LazyOptions::new(),
            state: None,
        }
    }

    /// Branch shown until the loader settles.
    pub fn loading<F>(mut self, loading: F) -> Self
    where
        F: Fn() -> Mountable<H> + 'static,
    {
        self.loading = Some(Rc::new(loading));
        self
    }

    /// Branch shown when the loader fails or times out.
    pub fn error<F>(mut self, error: F) -> Self
    where
        F: Fn(&Error) -> Mountable<H> + 'static,
    {
        self.error = Some(Rc::new(error));
        self
    }

    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.options = self.options.min_delay(delay);
        self
    }

    pub fn timeout(mut self, after: Duration) -> Self {
        self.options = self.options.timeout(after);
        self
    }

    pub fn options(mut self, options: LazyOptions) -> Self {
        self.options = options;
        self
    }

    /// Mirror the lifecycle into `state`. It is set to `Loading` on mount.
    pub fn observe(mut self, state: Ref<LazyState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Finish the builder.
    ///
    /// Mounting outside a tokio runtime fails with [`Error::Unsupported`].
    ///
    /// # Panics
    ///
    /// Mounting inside a runtime but outside a `LocalSet` panics, as
    /// `tokio::task::spawn_local` does.
    pub fn build(self) -> Mountable<H> {
        Mountable::new(move |host: &H| self.mount(host))
    }

    fn mount(self, host: &H) -> Result<Option<Unmount>> {
        let Self {
            loader,
            loading,
            error,
            options,
            state,
        } = self;

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::Unsupported {
                capability: "tokio runtime",
            });
        }

        let region = host.create_marker();
        host.append_marker(&region);
        let slot = Rc::new(LazySlot {
            host: host.slot(&region),
            scope: EffectScope::new(),
            branch: RefCell::new(None),
            alive: Cell::new(true),
        });

        let teardown = {
            let host = host.clone();
            let slot = Rc::clone(&slot);
            move || {
                slot.alive.set(false);
                slot.scope.stop();
                let branch = slot.branch.borrow_mut().take();
                if let Some(branch) = branch {
                    branch.unmount();
                }
                host.remove_marker(&region);
                tracing::trace!("lazy unmounted");
            }
        };

        if let Some(loading) = loading {
            if let Err(err) = slot.replace(loading()) {
                teardown();
                return Err(err);
            }
        }
        if let Some(state) = &state {
            state.set_if_changed(LazyState::Loading);
        }

        let start = Instant::now();
        let future = loader();
        let task_slot = Rc::clone(&slot);
        tokio::task::spawn_local(async move {
            let outcome = match options.timeout {
                Some(after) => match tokio::time::timeout(after, future).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::Timeout { after }),
                },
                None => future.await,
            };
            if let Some(delay) = options.min_delay {
                tokio::time::sleep_until(start + delay).await;
            }
            if !task_slot.alive.get() {
                tracing::trace!("lazy settled after unmount; ignored");
                return;
            }
            let settled = task_slot.settle(outcome, error.as_ref());
            if let Some(state) = state {
                if task_slot.alive.get() {
                    state.set(settled);
                }
            }
        });

        Ok(Some(Box::new(teardown)))
    }
}

/// Start a [`Lazy`] on `loader`.
pub fn lazy<H, F, Fut>(loader: F) -> Lazy<H>
where
    H: Host,
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = Result<Mountable<H>>> + 'static,
{
    Lazy::new(loader)
}

struct LazySlot<H: Host> {
    host: H,
    scope: EffectScope,
    branch: RefCell<Option<MountedBranch<H>>>,
    alive: Cell<bool>,
}

impl<H: Host> LazySlot<H> {
    /// Swap the mounted branch for `mountable`. No borrow is held while
    /// either branch runs its mount or cleanup.
    fn replace(&self, mountable: Mountable<H>) -> Result<()> {
        let previous = self.branch.borrow_mut().take();
        if let Some(previous) = previous {
            previous.unmount();
        }
        let branch = MountedBranch::mount(&self.host, &self.scope, mountable, Placement::Append)?;
        if self.alive.get() {
            *self.branch.borrow_mut() = Some(branch);
        } else {
            branch.unmount();
        }
        Ok(())
    }

    fn settle(&self, outcome: Result<Mountable<H>>, error: Option<&ErrorFactory<H>>) -> LazyState {
        match outcome {
            Ok(mountable) => match self.replace(mountable) {
                Ok(()) => {
                    tracing::trace!("lazy loaded");
                    LazyState::Loaded
                }
                Err(err) => {
                    report(err.clone());
                    LazyState::Errored(err)
                }
            },
            Err(err) => {
                match error {
                    Some(factory) => {
                        if let Err(mount_err) = self.replace(factory(&err)) {
                            report(mount_err);
                        }
                    }
                    None => {
                        tracing::warn!(error = %err, "lazy loader failed without an error branch");
                    }
                }
                LazyState::Errored(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphRuntime;
    use crate::host::{text, MemoryHost};
    use crate::reactive::configure;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn slow(delay: Duration, label: &'static str) -> Lazy<MemoryHost> {
        lazy(move || async move {
            sleep(delay).await;
            Ok(text(label))
        })
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn loaded_branch_replaces_loading() {
        LocalSet::new()
            .run_until(async {
                configure(GraphRuntime::new());
                let host = MemoryHost::new();
                let unmount = slow(ms(50), "ready")
                    .loading(|| text("loading"))
                    .build()
                    .mount(&host)
                    .unwrap()
                    .unwrap();
                assert_eq!(host.texts(), vec!["loading"]);

                sleep(ms(60)).await;
                assert_eq!(host.texts(), vec!["ready"]);

                unmount();
                assert!(host.texts().is_empty());
                assert!(host.children().is_empty());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn unmount_before_settle_leaves_host_alone() {
        LocalSet::new()
            .run_until(async {
                let host = MemoryHost::new();
                let unmount = slow(ms(50), "late")
                    .loading(|| text("loading"))
                    .build()
                    .mount(&host)
                    .unwrap()
                    .unwrap();
                unmount();
                let after_unmount = host.mutation_count();

                sleep(ms(100)).await;
                assert_eq!(host.mutation_count(), after_unmount);
                assert!(host.texts().is_empty());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn timeout_routes_to_error_branch() {
        LocalSet::new()
            .run_until(async {
                let host = MemoryHost::new();
                let _unmount = slow(ms(1_000), "never")
                    .timeout(ms(100))
                    .error(|err| text(if err.is_timeout() { "timed out" } else { "failed" }))
                    .build()
                    .mount(&host)
                    .unwrap();

                sleep(ms(150)).await;
                assert_eq!(host.texts(), vec!["timed out"]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn min_delay_holds_the_loading_branch() {
        LocalSet::new()
            .run_until(async {
                let host = MemoryHost::new();
                let _unmount = lazy(|| async { Ok(text("fast")) })
                    .loading(|| text("loading"))
                    .min_delay(ms(200))
                    .build()
                    .mount(&host)
                    .unwrap();

                sleep(ms(100)).await;
                assert_eq!(host.texts(), vec!["loading"], "resolved but held");
                sleep(ms(150)).await;
                assert_eq!(host.texts(), vec!["fast"]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn failure_without_error_branch_keeps_view() {
        LocalSet::new()
            .run_until(async {
                configure(GraphRuntime::new());
                let host = MemoryHost::new();
                let state = Ref::new(LazyState::Loaded).unwrap();
                let _unmount = lazy(|| async { Err(Error::load("offline")) })
                    .loading(|| text("loading"))
                    .observe(state.clone())
                    .build()
                    .mount(&host)
                    .unwrap();
                assert_eq!(state.get(), LazyState::Loading);

                sleep(ms(10)).await;
                assert_eq!(host.texts(), vec!["loading"]);
                assert_eq!(state.get(), LazyState::Errored(Error::load("offline")));
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn observed_state_reaches_loaded() {
        LocalSet::new()
            .run_until(async {
                configure(GraphRuntime::new());
                let host = MemoryHost::new();
                let state = Ref::new(LazyState::Loading).unwrap();
                let _unmount = slow(ms(20), "done")
                    .observe(state.clone())
                    .build()
                    .mount(&host)
                    .unwrap();
                assert!(!state.get().is_settled());

                sleep(ms(30)).await;
                assert_eq!(state.get(), LazyState::Loaded);
                assert_eq!(host.texts(), vec!["done"]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn async_component_resolves_without_branches() {
        LocalSet::new()
            .run_until(async {
                let host = MemoryHost::new();
                let view = crate::component::async_component(|| async {
                    sleep(ms(5)).await;
                    Ok(text("component"))
                });
                let _unmount = view.mount(&host).unwrap();
                assert!(host.texts().is_empty());

                sleep(ms(10)).await;
                assert_eq!(host.texts(), vec!["component"]);
            })
            .await;
    }

    #[test]
    fn mount_outside_tokio_is_unsupported() {
        let host = MemoryHost::new();
        let result = lazy(|| async { Ok(text("x")) }).build().mount(&host);
        assert_eq!(
            result.err(),
            Some(Error::Unsupported {
                capability: "tokio runtime"
            })
        );
        assert_eq!(host.mutation_count(), 0);
    }

    #[test]
    fn options_round_trip_through_json() {
        let options = LazyOptions::new().min_delay(ms(200)).timeout(ms(5_000));
        let json = serde_json::to_string(&options).unwrap();
        let back: LazyOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);

        let empty: LazyOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, LazyOptions::default());
    }
}

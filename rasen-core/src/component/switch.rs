//! Multi-way keyed branch.

use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use super::branch::mount_switch;
use super::{Factory, Mountable};
use crate::error::Error;
use crate::host::Host;
use crate::reactive::WatchSource;

/// Builder for a multi-way branch.
///
/// # Example
///
/// ```rust,ignore
/// let view = switch_case(tab.clone())
///     .case(Tab::Home, || home())
///     .case(Tab::Settings, || settings())
///     .default(|| not_found())
///     .build();
/// ```
pub struct SwitchCase<D, H> {
    source: Rc<dyn Fn() -> D>,
    cases: IndexMap<D, Factory<H>>,
    default: Option<Factory<H>>,
    cached: bool,
}

impl<D, H> SwitchCase<D, H>
where
    D: Clone + Eq + Hash + Debug + 'static,
    H: Host,
{
    pub fn new<S>(source: S) -> Self
    where
        S: WatchSource<D> + 'static,
    {
        Self {
            source: Rc::new(move || source.read()),
            cases: IndexMap::new(),
            default: None,
            cached: false,
        }
    }

    /// Branch for `value`. A later case for the same value replaces it.
    pub fn case<F>(mut self, value: D, factory: F) -> Self
    where
        F: Fn() -> Mountable<H> + 'static,
    {
        self.cases.insert(value, Rc::new(factory));
        self
    }

    /// Branch for values with no case.
    pub fn default<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Mountable<H> + 'static,
    {
        self.default = Some(Rc::new(factory));
        self
    }

    /// Hide inactive branches and reuse them. Requires hide/show.
    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Finish the builder.
    ///
    /// Mounting fails with [`Error::UnknownBranch`] when the initial value
    /// has neither a case nor a default. A later unmatched value is reported
    /// to the error handler and the current branch stays mounted.
    pub fn build(self) -> Mountable<H> {
        let Self {
            source,
            cases,
            default,
            cached,
        } = self;
        Mountable::new(move |host: &H| {
            mount_switch(host, move || source(), cached, move |value: &D| {
                match cases.get(value).or(default.as_ref()) {
                    Some(factory) => Ok(Some(Rc::clone(factory))),
                    None => Err(Error::UnknownBranch {
                        discriminant: format!("{value:?}"),
                    }),
                }
            })
        })
    }
}

/// Start a [`SwitchCase`] on `source`.
pub fn switch_case<D, H, S>(source: S) -> SwitchCase<D, H>
where
    D: Clone + Eq + Hash + Debug + 'static,
    H: Host,
    S: WatchSource<D> + 'static,
{
    SwitchCase::new(source)
}

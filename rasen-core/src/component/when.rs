//! Binary conditional.

use std::rc::Rc;

use super::branch::mount_switch;
use super::{Factory, Mountable};
use crate::host::Host;
use crate::reactive::WatchSource;

/// Builder for a conditional branch.
///
/// # Example
///
/// ```rust,ignore
/// let view = When::new(move || count.get() > 0, || text("positive"))
///     .otherwise(|| text("zero"))
///     .build();
/// ```
pub struct When<H> {
    condition: Rc<dyn Fn() -> bool>,
    then: Factory<H>,
    otherwise: Option<Factory<H>>,
    cached: bool,
}

impl<H: Host> When<H> {
    pub fn new<C, T>(condition: C, then: T) -> Self
    where
        C: WatchSource<bool> + 'static,
        T: Fn() -> Mountable<H> + 'static,
    {
        Self {
            condition: Rc::new(move || condition.read()),
            then: Rc::new(then),
            otherwise: None,
            cached: false,
        }
    }

    /// Branch mounted while the condition is false.
    pub fn otherwise<E>(mut self, otherwise: E) -> Self
    where
        E: Fn() -> Mountable<H> + 'static,
    {
        self.otherwise = Some(Rc::new(otherwise));
        self
    }

    /// Hide the inactive branch instead of unmounting it. Mounting fails
    /// with [`Error::Unsupported`](crate::Error::Unsupported) on hosts
    /// without hide/show.
    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    pub fn build(self) -> Mountable<H> {
        let Self {
            condition,
            then,
            otherwise,
            cached,
        } = self;
        Mountable::new(move |host: &H| {
            mount_switch(host, move || condition(), cached, move |&value: &bool| {
                Ok(if value { Some(Rc::clone(&then)) } else { otherwise.clone() })
            })
        })
    }
}

/// Mount `then()` while `condition` holds, nothing otherwise.
///
/// The branch is only re-created when the condition flips.
pub fn when<H, C, T>(condition: C, then: T) -> Mountable<H>
where
    H: Host,
    C: WatchSource<bool> + 'static,
    T: Fn() -> Mountable<H> + 'static,
{
    When::new(condition, then).build()
}

/// Mount `then()` while `condition` holds and `otherwise()` while it does not.
pub fn when_else<H, C, T, E>(condition: C, then: T, otherwise: E) -> Mountable<H>
where
    H: Host,
    C: WatchSource<bool> + 'static,
    T: Fn() -> Mountable<H> + 'static,
    E: Fn() -> Mountable<H> + 'static,
{
    When::new(condition, then).otherwise(otherwise).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphRuntime;
    use crate::host::{text, MemoryHost};
    use crate::reactive::{configure, Ref};
    use crate::Error;
    use std::cell::Cell;

    fn setup() {
        configure(GraphRuntime::new());
    }

    fn counted(label: &'static str, count: Rc<Cell<i32>>) -> impl Fn() -> Mountable<MemoryHost> {
        move || {
            count.set(count.get() + 1);
            text(label)
        }
    }

    #[test]
    fn unchanged_truthiness_does_not_remount() {
        setup();
        let host = MemoryHost::new();
        let count = Ref::new(1).unwrap();
        let created = Rc::new(Cell::new(0));

        let view = {
            let count = count.clone();
            when(move || count.get() != 0, counted("then", created.clone()))
        };
        let unmount = view.mount(&host).unwrap().unwrap();
        assert_eq!(created.get(), 1);

        count.set(2);
        assert_eq!(created.get(), 1, "still truthy");
        assert_eq!(host.texts(), vec!["then"]);

        count.set(0);
        assert!(host.texts().is_empty());
        count.set(3);
        assert_eq!(created.get(), 2);

        unmount();
        assert!(host.texts().is_empty());
    }

    #[test]
    fn else_branch_swaps_in() {
        setup();
        let host = MemoryHost::new();
        let flag = Ref::new(true).unwrap();

        let unmount = when_else(flag.clone(), || text("yes"), || text("no"))
            .mount(&host)
            .unwrap()
            .unwrap();
        assert_eq!(host.texts(), vec!["yes"]);

        flag.set(false);
        assert_eq!(host.texts(), vec!["no"]);

        unmount();
        flag.set(true);
        assert!(host.texts().is_empty(), "no updates after unmount");
    }

    #[test]
    fn branch_stays_between_siblings() {
        setup();
        let host = MemoryHost::new();
        let flag = Ref::new(false).unwrap();

        let view = crate::component::fragment(vec![
            text("["),
            when(flag.clone(), || text("x")),
            text("]"),
        ]);
        let _unmount = view.mount(&host).unwrap();
        assert_eq!(host.render(), "[]");

        flag.set(true);
        assert_eq!(host.render(), "[x]");
    }

    #[test]
    fn cached_when_reuses_branches() {
        setup();
        let host = MemoryHost::new();
        let flag = Ref::new(true).unwrap();
        let then_count = Rc::new(Cell::new(0));
        let else_count = Rc::new(Cell::new(0));

        let unmount = When::new(flag.clone(), counted("a", then_count.clone()))
            .otherwise(counted("b", else_count.clone()))
            .cached()
            .build()
            .mount(&host)
            .unwrap()
            .unwrap();

        flag.set(false);
        flag.set(true);
        flag.set(false);
        assert_eq!(host.texts(), vec!["b"]);
        assert_eq!((then_count.get(), else_count.get()), (1, 1));
        unmount();
    }

    #[test]
    fn cached_when_needs_hide_show() {
        setup();
        let host = MemoryHost::append_only();
        let result = When::new(|| true, || text("a")).cached().build().mount(&host);
        assert_eq!(
            result.err(),
            Some(Error::Unsupported {
                capability: "hide/show"
            })
        );
        assert_eq!(host.mutation_count(), 0);
    }
}

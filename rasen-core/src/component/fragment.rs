//! Ordered composition.

use smallvec::SmallVec;

use super::{run_unmount, Mountable, Unmount};
use crate::host::Host;

/// Mount `children` against the same host, in order.
///
/// The returned cleanup runs every child cleanup in the same order. An empty
/// list still returns a (no-op) cleanup. If a child fails to mount, the
/// children mounted before it are unmounted and the error is returned.
pub fn fragment<H: Host>(children: Vec<Mountable<H>>) -> Mountable<H> {
    Mountable::new(move |host: &H| {
        let total = children.len();
        let mut unmounts: SmallVec<[Unmount; 4]> = SmallVec::new();
        for child in children {
            match child.mount(host) {
                Ok(Some(unmount)) => unmounts.push(unmount),
                Ok(None) => {}
                Err(err) => {
                    for unmount in unmounts {
                        run_unmount(unmount);
                    }
                    return Err(err);
                }
            }
        }
        tracing::trace!(children = total, cleanups = unmounts.len(), "fragment mounted");

        let cleanup: Unmount = Box::new(move || {
            for unmount in unmounts {
                run_unmount(unmount);
            }
        });
        Ok(Some(cleanup))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{text, MemoryHost};
    use crate::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn logged(name: &'static str, log: Rc<RefCell<Vec<String>>>) -> Mountable<MemoryHost> {
        Mountable::from_fn(move |_| {
            log.borrow_mut().push(format!("mount {name}"));
            Some(Box::new(move || log.borrow_mut().push(format!("unmount {name}"))) as Unmount)
        })
    }

    #[test]
    fn empty_fragment_has_defined_cleanup() {
        let host = MemoryHost::new();
        let unmount = fragment::<MemoryHost>(Vec::new()).mount(&host).unwrap();
        let unmount = unmount.expect("empty fragment still returns a cleanup");
        unmount();
        assert_eq!(host.mutation_count(), 0);
    }

    #[test]
    fn children_mount_and_unmount_in_order() {
        let host = MemoryHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let unmount = fragment(vec![
            logged("a", log.clone()),
            Mountable::empty(),
            logged("b", log.clone()),
        ])
        .mount(&host)
        .unwrap()
        .unwrap();
        unmount();

        assert_eq!(
            *log.borrow(),
            vec!["mount a", "mount b", "unmount a", "unmount b"]
        );
    }

    #[test]
    fn failing_child_rolls_back_siblings() {
        let host = MemoryHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let result = fragment(vec![
            logged("a", log.clone()),
            Mountable::new(|_| Err(Error::RuntimeNotConfigured)),
            logged("c", log.clone()),
        ])
        .mount(&host);

        assert_eq!(result.err(), Some(Error::RuntimeNotConfigured));
        assert_eq!(*log.borrow(), vec!["mount a", "unmount a"]);
    }

    #[test]
    fn text_children_keep_order() {
        let host = MemoryHost::new();
        let unmount = fragment(vec![text("a"), text("b"), text("c")])
            .mount(&host)
            .unwrap()
            .unwrap();
        assert_eq!(host.render(), "abc");
        unmount();
        assert_eq!(host.render(), "");
    }
}

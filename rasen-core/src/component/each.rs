//! Keyed List Reconciliation
//!
//! `each` maps a reactive collection to one mounted entry per key and keeps
//! that mapping up to date with as little host work as possible.
//!
//! # How Reconciliation Works
//!
//! 1. Compute the new key sequence. A repeated key aborts the update with
//!    [`Error::DuplicateKey`] before anything is touched.
//!
//! 2. Entries whose key disappeared are unmounted, in their old order.
//!
//! 3. If the surviving entries are already in the right order and every new
//!    key comes after them, new entries are simply appended. This covers the
//!    initial mount and the common "push" update on every host.
//!
//! 4. Otherwise, on hosts with ordered insertion, a longest increasing
//!    subsequence over the survivors' old positions picks the entries that
//!    stay put. New entries are mounted into detached markers, then a single
//!    backward pass inserts them and moves every survivor outside the
//!    subsequence in front of its successor.
//!
//! 5. On append-only hosts a reorder falls back to rebuilding every entry.
//!
//! Survivors are never re-rendered. Their item and index are pushed into the
//! `Ref`s handed to the render function, so anything inside the entry that
//! reads them updates in place.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use super::slot::{MountedBranch, Placement};
use super::{Mountable, Unmount};
use crate::error::{report, Error, Result};
use crate::host::Host;
use crate::reactive::{untracked, watch, EffectScope, Ref, WatchOptions, WatchSource};

type Render<T, H> = Rc<dyn Fn(Ref<T>, Ref<usize>) -> Mountable<H>>;

struct Entry<T: 'static, H: Host> {
    item: Ref<T>,
    index: Ref<usize>,
    branch: MountedBranch<H>,
}

impl<T: 'static, H: Host> Entry<T, H> {
    fn mount(
        host: &H,
        scope: &EffectScope,
        render: &Render<T, H>,
        item: T,
        index: usize,
        placement: Placement,
    ) -> Result<Self> {
        let item = Ref::new(item)?;
        let index = Ref::new(index)?;
        let mountable = render(item.clone(), index.clone());
        let branch = MountedBranch::mount(host, scope, mountable, placement)?;
        Ok(Self {
            item,
            index,
            branch,
        })
    }
}

/// Counts reported after each reconciliation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Summary {
    created: usize,
    removed: usize,
    moved: usize,
    rebuilt: bool,
}

/// An entry on its way into the new order.
struct Placed<K, T: 'static, H: Host> {
    key: K,
    entry: Entry<T, H>,
    /// New value for a survivor, applied after the host is reordered.
    item: Option<T>,
    old_position: Option<usize>,
}

struct KeyedList<K, T: 'static, H: Host> {
    host: H,
    scope: EffectScope,
    render: Render<T, H>,
    key_of: Rc<dyn Fn(&T) -> K>,
    entries: IndexMap<K, Entry<T, H>>,
}

impl<K, T, H> KeyedList<K, T, H>
where
    K: Clone + Eq + Hash + Debug + 'static,
    T: Clone + PartialEq + 'static,
    H: Host,
{
    fn reconcile(&mut self, items: Vec<T>) -> Result<Summary> {
        let keys: Vec<K> = items.iter().map(|item| (self.key_of)(item)).collect();
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key) {
                return Err(Error::DuplicateKey {
                    key: format!("{key:?}"),
                });
            }
        }

        let mut summary = Summary::default();

        // Drop entries whose key is gone, keeping survivors in old order.
        let previous = std::mem::take(&mut self.entries);
        let mut retained = IndexMap::with_capacity(previous.len());
        for (key, entry) in previous {
            if seen.contains(&key) {
                retained.insert(key, entry);
            } else {
                entry.branch.unmount();
                summary.removed += 1;
            }
        }
        self.entries = retained;

        let in_order = self.entries.len() <= keys.len()
            && self
                .entries
                .keys()
                .zip(keys.iter())
                .all(|(old, new)| old == new);

        if in_order {
            self.append_tail(&keys, items, &mut summary)?;
        } else if self.host.capabilities().supports_ordered_insert() {
            self.reorder(keys, items, &mut summary)?;
        } else {
            self.rebuild(&keys, items, &mut summary)?;
        }

        tracing::debug!(
            created = summary.created,
            removed = summary.removed,
            moved = summary.moved,
            rebuilt = summary.rebuilt,
            "keyed list reconciled"
        );
        Ok(summary)
    }

    /// Survivors form a prefix of the new sequence: refresh them and append
    /// the rest.
    fn append_tail(&mut self, keys: &[K], items: Vec<T>, summary: &mut Summary) -> Result<()> {
        let prefix = self.entries.len();
        for (index, (key, item)) in keys.iter().zip(items).enumerate() {
            if index < prefix {
                if let Some(entry) = self.entries.get(key) {
                    entry.item.set_if_changed(item);
                    entry.index.set_if_changed(index);
                }
                continue;
            }
            let entry = Entry::mount(
                &self.host,
                &self.scope,
                &self.render,
                item,
                index,
                Placement::Append,
            )?;
            self.entries.insert(key.clone(), entry);
            summary.created += 1;
        }
        Ok(())
    }

    fn reorder(&mut self, keys: Vec<K>, items: Vec<T>, summary: &mut Summary) -> Result<()> {
        // Old positions of the survivors, in new order.
        let old_positions: Vec<usize> = keys
            .iter()
            .filter_map(|key| self.entries.get_index_of(key))
            .collect();
        let stable: HashSet<usize> = longest_increasing_subsequence(&old_positions)
            .into_iter()
            .map(|rank| old_positions[rank])
            .collect();

        let mut survivors: IndexMap<K, (usize, Entry<T, H>)> = std::mem::take(&mut self.entries)
            .into_iter()
            .enumerate()
            .map(|(position, (key, entry))| (key, (position, entry)))
            .collect();
        let mut next: Vec<Placed<K, T, H>> = Vec::with_capacity(keys.len());

        // Forward pass: render new entries in order, into detached markers.
        for (index, (key, item)) in keys.into_iter().zip(items).enumerate() {
            if let Some((position, entry)) = survivors.shift_remove(&key) {
                next.push(Placed {
                    key,
                    entry,
                    item: Some(item),
                    old_position: Some(position),
                });
                continue;
            }
            let mounted = Entry::mount(
                &self.host,
                &self.scope,
                &self.render,
                item,
                index,
                Placement::Detached,
            );
            match mounted {
                Ok(entry) => {
                    summary.created += 1;
                    next.push(Placed {
                        key,
                        entry,
                        item: None,
                        old_position: None,
                    });
                }
                Err(err) => {
                    self.restore(next, survivors);
                    return Err(err);
                }
            }
        }

        // Backward pass: everything not stable goes in front of its successor.
        let mut anchor: Option<H::Node> = None;
        for placed in next.iter().rev() {
            let keep = placed
                .old_position
                .is_some_and(|position| stable.contains(&position));
            if !keep {
                placed.entry.branch.move_before(anchor.as_ref());
                if placed.old_position.is_some() {
                    summary.moved += 1;
                }
            }
            anchor = Some(placed.entry.branch.marker().clone());
        }

        // Push fresh values into survivors once the host is in order.
        for (index, placed) in next.iter_mut().enumerate() {
            if let Some(item) = placed.item.take() {
                placed.entry.item.set_if_changed(item);
                placed.entry.index.set_if_changed(index);
            }
        }

        self.entries = next
            .into_iter()
            .map(|placed| (placed.key, placed.entry))
            .collect();
        Ok(())
    }

    /// Undo a failed reorder: unmount fresh entries and put survivors back
    /// in their old order, which is still the host order.
    fn restore(
        &mut self,
        placed: Vec<Placed<K, T, H>>,
        untouched: IndexMap<K, (usize, Entry<T, H>)>,
    ) {
        let mut survivors: Vec<(usize, K, Entry<T, H>)> = untouched
            .into_iter()
            .map(|(key, (position, entry))| (position, key, entry))
            .collect();
        for placed in placed {
            match placed.old_position {
                Some(position) => survivors.push((position, placed.key, placed.entry)),
                None => placed.entry.branch.unmount(),
            }
        }
        survivors.sort_by_key(|(position, _, _)| *position);
        self.entries = survivors
            .into_iter()
            .map(|(_, key, entry)| (key, entry))
            .collect();
    }

    /// Append-only fallback: unmount every survivor and mount everything in
    /// the new order.
    fn rebuild(&mut self, keys: &[K], items: Vec<T>, summary: &mut Summary) -> Result<()> {
        summary.rebuilt = true;
        for (_, entry) in self.entries.drain(..) {
            entry.branch.unmount();
            summary.removed += 1;
        }
        self.append_tail(keys, items, summary)
    }

    fn teardown(&mut self) {
        for (_, entry) in self.entries.drain(..) {
            entry.branch.unmount();
        }
    }
}

/// Indices (into `sequence`) of one longest strictly increasing subsequence.
pub(crate) fn longest_increasing_subsequence(sequence: &[usize]) -> Vec<usize> {
    // tails[k]: index of the smallest tail of an increasing run of length k+1
    let mut tails: Vec<usize> = Vec::new();
    let mut parents: Vec<Option<usize>> = vec![None; sequence.len()];

    for (i, &value) in sequence.iter().enumerate() {
        let slot = tails.partition_point(|&t| sequence[t] < value);
        if slot > 0 {
            parents[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        result.push(i);
        cursor = parents[i];
    }
    result.reverse();
    result
}

fn mount_list<K, T, H, S>(
    host: &H,
    source: S,
    key_of: Rc<dyn Fn(&T) -> K>,
    render: Render<T, H>,
) -> Result<Option<Unmount>>
where
    K: Clone + Eq + Hash + Debug + 'static,
    T: Clone + PartialEq + 'static,
    H: Host,
    S: WatchSource<Vec<T>> + 'static,
{
    let region = host.create_marker();
    host.append_marker(&region);
    let scope = EffectScope::new();
    let list = Rc::new(RefCell::new(KeyedList {
        host: host.slot(&region),
        scope: scope.clone(),
        render,
        key_of,
        entries: IndexMap::new(),
    }));

    let teardown = {
        let host = host.clone();
        let scope = scope.clone();
        let list = Rc::clone(&list);
        move || {
            scope.stop();
            list.borrow_mut().teardown();
            host.remove_marker(&region);
        }
    };

    let initial = untracked(|| source.read());
    let first = list.borrow_mut().reconcile(initial);
    if let Err(err) = first {
        teardown();
        return Err(err);
    }

    let watcher = scope.run(|| {
        let list = Rc::clone(&list);
        watch(
            source,
            move |items: &Vec<T>, _: &Vec<T>| {
                let Ok(mut list) = list.try_borrow_mut() else {
                    tracing::warn!("keyed list re-entered; update skipped");
                    return;
                };
                if let Err(err) = list.reconcile(items.clone()) {
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

/// Render one entry per item, keyed by the item itself.
///
/// # Example
///
/// ```rust,ignore
/// let view = each(names.clone(), |name, _index| text_with(move || name.get()));
/// ```
pub fn each<T, H, S, R>(items: S, render: R) -> Mountable<H>
where
    T: Clone + Eq + Hash + Debug + 'static,
    H: Host,
    S: WatchSource<Vec<T>> + 'static,
    R: Fn(Ref<T>, Ref<usize>) -> Mountable<H> + 'static,
{
    each_keyed(items, T::clone, render)
}

/// Render one entry per item, keyed by `key`.
///
/// Entries are retained across updates as long as their key is present.
/// A retained entry whose item changed receives the new value through its
/// item `Ref` instead of being rendered again.
pub fn each_keyed<T, K, H, S, F, R>(items: S, key: F, render: R) -> Mountable<H>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + Debug + 'static,
    H: Host,
    S: WatchSource<Vec<T>> + 'static,
    F: Fn(&T) -> K + 'static,
    R: Fn(Ref<T>, Ref<usize>) -> Mountable<H> + 'static,
{
    let key_of: Rc<dyn Fn(&T) -> K> = Rc::new(key);
    let render: Render<T, H> = Rc::new(render);
    Mountable::new(move |host: &H| mount_list(host, items, key_of, render))
}

/// Render `count` entries keyed by index.
pub fn repeat<H, S, R>(count: S, render: R) -> Mountable<H>
where
    H: Host,
    S: WatchSource<usize> + 'static,
    R: Fn(usize) -> Mountable<H> + 'static,
{
    let indices = move || (0..count.read()).collect::<Vec<usize>>();
    each_keyed(indices, |index: &usize| *index, move |index, _| {
        render(index.get_untracked())
    })
}

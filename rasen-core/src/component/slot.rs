//! A mounted branch: one marker, one scope, one cleanup.
//!
//! Every branch of a conditional and every keyed list entry is a
//! [`MountedBranch`]. Its content is mounted through the marker's slot, so
//! moving the marker moves the content, and its watchers live in a child of
//! the owning primitive's scope.

use super::{run_unmount, Mountable, Unmount};
use crate::error::Result;
use crate::host::Host;
use crate::reactive::EffectScope;

/// Where a new branch marker goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Last child of the host, attached before the content mounts.
    Append,
    /// Not attached; the caller positions it afterwards.
    Detached,
}

pub(crate) struct MountedBranch<H: Host> {
    host: H,
    marker: H::Node,
    scope: EffectScope,
    unmount: Option<Unmount>,
}

impl<H: Host> MountedBranch<H> {
    pub(crate) fn mount(
        host: &H,
        owner: &EffectScope,
        mountable: Mountable<H>,
        placement: Placement,
    ) -> Result<Self> {
        let marker = host.create_marker();
        if placement == Placement::Append {
            host.append_marker(&marker);
        }
        let slot = host.slot(&marker);
        let scope = owner.child();

        let unmount = match scope.run(|| mountable.mount(&slot)) {
            Some(Ok(unmount)) => unmount,
            Some(Err(err)) => {
                scope.stop();
                host.remove_marker(&marker);
                return Err(err);
            }
            // The owner stopped; nothing was mounted.
            None => None,
        };

        Ok(Self {
            host: host.clone(),
            marker,
            scope,
            unmount,
        })
    }

    pub(crate) fn marker(&self) -> &H::Node {
        &self.marker
    }

    /// Move the branch before `reference`, or to the end.
    pub(crate) fn move_before(&self, reference: Option<&H::Node>) {
        self.host.insert_before(&self.marker, reference);
    }

    pub(crate) fn set_hidden(&self, hidden: bool) {
        self.host.set_hidden(&self.marker, hidden);
    }

    /// Stop the branch's scope, run its cleanup and remove its marker.
    pub(crate) fn unmount(mut self) {
        self.scope.stop();
        if let Some(unmount) = self.unmount.take() {
            run_unmount(unmount);
        }
        self.host.remove_marker(&self.marker);
    }
}

//! Node identifiers.
//!
//! Every reactive node a backend hands out (source, derived value or effect)
//! is named by a [`NodeId`]. The typed wrappers in this module only ever pass
//! ids back to the backend that created them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a reactive node.
///
/// Ids are allocated from a process-wide counter, so ids from different
/// runtimes never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

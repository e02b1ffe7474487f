//! In-memory reference host.
//!
//! [`MemoryHost`] keeps a node tree in memory and logs every mutation as a
//! [`HostOp`]. It backs the crate's tests, works for headless rendering, and
//! shows what a real binding has to provide.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{Host, HostCapabilities};
use crate::component::{Mountable, Unmount};
use crate::reactive::{untracked, watch, WatchOptions, WatchSource};

/// Handle to a node of a [`MemoryHost`] tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryNode(usize);

impl MemoryNode {
    /// The tree root.
    pub const ROOT: Self = Self(0);
}

impl fmt::Display for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One logged host mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateMarker {
        node: MemoryNode,
    },
    AppendMarker {
        parent: MemoryNode,
        node: MemoryNode,
    },
    InsertBefore {
        parent: MemoryNode,
        node: MemoryNode,
        reference: Option<MemoryNode>,
    },
    RemoveMarker {
        node: MemoryNode,
    },
    SetHidden {
        node: MemoryNode,
        hidden: bool,
    },
    AppendText {
        parent: MemoryNode,
        node: MemoryNode,
        text: String,
    },
    SetText {
        node: MemoryNode,
        text: String,
    },
    RemoveText {
        node: MemoryNode,
    },
}

impl HostOp {
    /// Whether the operation changes the visible tree. Creating a detached
    /// marker does not.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::CreateMarker { .. })
    }

    /// Whether the operation repositions an existing node.
    pub fn is_reposition(&self) -> bool {
        matches!(self, Self::InsertBefore { .. })
    }
}

#[derive(Debug)]
enum Content {
    Root,
    Marker,
    Text(String),
}

#[derive(Debug)]
struct Entry {
    content: Content,
    parent: Option<MemoryNode>,
    children: Vec<MemoryNode>,
    hidden: bool,
}

#[derive(Debug)]
struct Tree {
    entries: Vec<Entry>,
    ops: Vec<HostOp>,
}

impl Tree {
    fn new() -> Self {
        Self {
            entries: vec![Entry {
                content: Content::Root,
                parent: None,
                children: Vec::new(),
                hidden: false,
            }],
            ops: Vec::new(),
        }
    }

    fn alloc(&mut self, content: Content) -> MemoryNode {
        let node = MemoryNode(self.entries.len());
        self.entries.push(Entry {
            content,
            parent: None,
            children: Vec::new(),
            hidden: false,
        });
        node
    }

    fn entry(&self, node: MemoryNode) -> Option<&Entry> {
        self.entries.get(node.0)
    }

    fn entry_mut(&mut self, node: MemoryNode) -> Option<&mut Entry> {
        self.entries.get_mut(node.0)
    }

    fn detach(&mut self, node: MemoryNode) {
        let parent = self.entry_mut(node).and_then(|entry| entry.parent.take());
        if let Some(parent) = parent.and_then(|parent| self.entry_mut(parent)) {
            parent.children.retain(|child| *child != node);
        }
    }

    fn attach(&mut self, parent: MemoryNode, node: MemoryNode, before: Option<MemoryNode>) {
        self.detach(node);
        let Some(parent_entry) = self.entry_mut(parent) else {
            return;
        };
        let position = before.and_then(|before| {
            parent_entry
                .children
                .iter()
                .position(|child| *child == before)
        });
        match position {
            Some(index) => parent_entry.children.insert(index, node),
            None => {
                if let Some(before) = before {
                    tracing::warn!(%before, %parent, "insert_before reference is not a child; appending");
                }
                parent_entry.children.push(node);
            }
        }
        if let Some(entry) = self.entry_mut(node) {
            entry.parent = Some(parent);
        }
    }

    fn collect_texts(&self, node: MemoryNode, out: &mut Vec<String>) {
        let Some(entry) = self.entry(node) else {
            return;
        };
        if entry.hidden {
            return;
        }
        if let Content::Text(text) = &entry.content {
            out.push(text.clone());
        }
        for child in &entry.children {
            self.collect_texts(*child, out);
        }
    }

    fn is_attached(&self, node: MemoryNode) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == MemoryNode::ROOT {
                return true;
            }
            current = self.entry(id).and_then(|entry| entry.parent);
        }
        false
    }
}

/// An in-memory host.
///
/// Clones share the same tree. [`Host::slot`] returns a handle that mounts
/// into a marker of the same tree.
///
/// # Example
///
/// ```rust,ignore
/// let host = MemoryHost::new();
/// let handle = mount_root(fragment(vec![text("a"), text("b")]), &host)?;
/// assert_eq!(host.texts(), vec!["a", "b"]);
/// ```
#[derive(Clone)]
pub struct MemoryHost {
    tree: Rc<RefCell<Tree>>,
    parent: MemoryNode,
    caps: HostCapabilities,
}

impl MemoryHost {
    /// A host with every capability.
    pub fn new() -> Self {
        Self::with_capabilities(HostCapabilities::FULL)
    }

    /// A host that can only append and remove.
    pub fn append_only() -> Self {
        Self::with_capabilities(HostCapabilities::APPEND_ONLY)
    }

    pub fn with_capabilities(caps: HostCapabilities) -> Self {
        Self {
            tree: Rc::new(RefCell::new(Tree::new())),
            parent: MemoryNode::ROOT,
            caps,
        }
    }

    /// The node this handle mounts into.
    pub fn node(&self) -> MemoryNode {
        self.parent
    }

    fn log(&self, op: HostOp) {
        tracing::trace!(?op, "memory host");
        self.tree.borrow_mut().ops.push(op);
    }

    /// Append a text leaf.
    pub fn append_text(&self, text: impl Into<String>) -> MemoryNode {
        let text = text.into();
        let node = {
            let mut tree = self.tree.borrow_mut();
            let node = tree.alloc(Content::Text(text.clone()));
            tree.attach(self.parent, node, None);
            node
        };
        self.log(HostOp::AppendText {
            parent: self.parent,
            node,
            text,
        });
        node
    }

    /// Replace the content of a text leaf.
    pub fn set_text(&self, node: MemoryNode, text: impl Into<String>) {
        let text = text.into();
        if let Some(entry) = self.tree.borrow_mut().entry_mut(node) {
            entry.content = Content::Text(text.clone());
        }
        self.log(HostOp::SetText { node, text });
    }

    /// Detach a text leaf.
    pub fn remove_text(&self, node: MemoryNode) {
        self.tree.borrow_mut().detach(node);
        self.log(HostOp::RemoveText { node });
    }

    /// Visible text leaves under this handle, in document order.
    pub fn texts(&self) -> Vec<String> {
        let mut out = Vec::new();
        let tree = self.tree.borrow();
        if let Some(entry) = tree.entry(self.parent) {
            if !entry.hidden {
                for child in &entry.children {
                    tree.collect_texts(*child, &mut out);
                }
            }
        }
        out
    }

    /// Visible text joined into one string.
    pub fn render(&self) -> String {
        self.texts().concat()
    }

    /// Whether `node` is reachable from the root.
    pub fn is_attached(&self, node: MemoryNode) -> bool {
        self.tree.borrow().is_attached(node)
    }

    /// Whether `node` is currently hidden.
    pub fn is_hidden(&self, node: MemoryNode) -> bool {
        self.tree
            .borrow()
            .entry(node)
            .is_some_and(|entry| entry.hidden)
    }

    /// Direct children of the node this handle mounts into.
    pub fn children(&self) -> Vec<MemoryNode> {
        self.tree
            .borrow()
            .entry(self.parent)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    /// Every operation logged so far, across all handles of the tree.
    pub fn ops(&self) -> Vec<HostOp> {
        self.tree.borrow().ops.clone()
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.tree.borrow_mut().ops)
    }

    /// Number of logged operations that changed the tree.
    pub fn mutation_count(&self) -> usize {
        self.tree
            .borrow()
            .ops
            .iter()
            .filter(|op| op.is_mutation())
            .count()
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("node", &self.parent)
            .field("caps", &self.caps)
            .field("texts", &self.texts())
            .finish()
    }
}

impl Host for MemoryHost {
    type Node = MemoryNode;

    fn capabilities(&self) -> HostCapabilities {
        self.caps
    }

    fn create_marker(&self) -> MemoryNode {
        let node = self.tree.borrow_mut().alloc(Content::Marker);
        self.log(HostOp::CreateMarker { node });
        node
    }

    fn append_marker(&self, marker: &MemoryNode) {
        self.tree.borrow_mut().attach(self.parent, *marker, None);
        self.log(HostOp::AppendMarker {
            parent: self.parent,
            node: *marker,
        });
    }

    fn insert_before(&self, marker: &MemoryNode, reference: Option<&MemoryNode>) {
        if reference.is_some() && !self.caps.supports_ordered_insert() {
            tracing::warn!(node = %marker, "ordered insert on an append-only memory host");
        }
        let reference = reference.copied();
        self.tree.borrow_mut().attach(self.parent, *marker, reference);
        self.log(HostOp::InsertBefore {
            parent: self.parent,
            node: *marker,
            reference,
        });
    }

    fn remove_marker(&self, marker: &MemoryNode) {
        self.tree.borrow_mut().detach(*marker);
        self.log(HostOp::RemoveMarker { node: *marker });
    }

    fn slot(&self, marker: &MemoryNode) -> Self {
        Self {
            tree: Rc::clone(&self.tree),
            parent: *marker,
            caps: self.caps,
        }
    }

    fn set_hidden(&self, marker: &MemoryNode, hidden: bool) {
        if let Some(entry) = self.tree.borrow_mut().entry_mut(*marker) {
            entry.hidden = hidden;
        }
        self.log(HostOp::SetHidden {
            node: *marker,
            hidden,
        });
    }
}

/// A static text leaf.
pub fn text(content: impl Into<String>) -> Mountable<MemoryHost> {
    let content = content.into();
    Mountable::new(move |host: &MemoryHost| {
        let node = host.append_text(content);
        let host = host.clone();
        let unmount: Unmount = Box::new(move || host.remove_text(node));
        Ok(Some(unmount))
    })
}

/// A text leaf that follows a reactive source.
pub fn text_with<S>(source: S) -> Mountable<MemoryHost>
where
    S: WatchSource<String> + 'static,
{
    Mountable::new(move |host: &MemoryHost| {
        let node = host.append_text(untracked(|| source.read()));
        let writer = host.clone();
        let handle = match watch(
            source,
            move |next: &String, _: &String| writer.set_text(node, next.clone()),
            WatchOptions::new(),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                host.remove_text(node);
                return Err(err);
            }
        };
        let host = host.clone();
        let unmount: Unmount = Box::new(move || {
            handle.stop();
            host.remove_text(node);
        });
        Ok(Some(unmount))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphRuntime;
    use crate::reactive::{configure, Ref};

    #[test]
    fn markers_order_their_content() {
        let host = MemoryHost::new();
        let a = host.create_marker();
        let b = host.create_marker();
        host.append_marker(&a);
        host.append_marker(&b);
        host.slot(&a).append_text("a");
        host.slot(&b).append_text("b");
        assert_eq!(host.texts(), vec!["a", "b"]);

        host.insert_before(&b, Some(&a));
        assert_eq!(host.texts(), vec!["b", "a"]);

        host.insert_before(&b, None);
        assert_eq!(host.render(), "ab");
    }

    #[test]
    fn removed_marker_takes_its_content() {
        let host = MemoryHost::new();
        let marker = host.create_marker();
        host.append_marker(&marker);
        let inner = host.slot(&marker).append_text("gone");
        assert!(host.is_attached(inner));

        host.remove_marker(&marker);
        assert!(host.texts().is_empty());
        assert!(!host.is_attached(inner));
    }

    #[test]
    fn hidden_markers_are_skipped() {
        let host = MemoryHost::new();
        let marker = host.create_marker();
        host.append_marker(&marker);
        host.slot(&marker).append_text("x");

        host.set_hidden(&marker, true);
        assert!(host.is_hidden(marker));
        assert!(host.texts().is_empty());

        host.set_hidden(&marker, false);
        assert_eq!(host.texts(), vec!["x"]);
    }

    #[test]
    fn detached_marker_content_appears_once_attached() {
        let host = MemoryHost::new();
        let marker = host.create_marker();
        host.slot(&marker).append_text("later");
        assert!(host.texts().is_empty());

        host.insert_before(&marker, None);
        assert_eq!(host.texts(), vec!["later"]);
    }

    #[test]
    fn op_log_records_mutations() {
        let host = MemoryHost::append_only();
        assert!(!host.capabilities().supports_ordered_insert());

        let marker = host.create_marker();
        host.append_marker(&marker);
        assert_eq!(host.mutation_count(), 1);
        assert_eq!(
            host.take_ops(),
            vec![
                HostOp::CreateMarker { node: marker },
                HostOp::AppendMarker {
                    parent: MemoryNode::ROOT,
                    node: marker
                },
            ]
        );
        assert!(host.ops().is_empty());
    }

    #[test]
    fn text_leaf_mounts_and_unmounts() {
        let host = MemoryHost::new();
        let unmount = text("hello").mount(&host).unwrap().unwrap();
        assert_eq!(host.texts(), vec!["hello"]);

        unmount();
        assert!(host.texts().is_empty());
    }

    #[test]
    fn reactive_text_follows_source() {
        configure(GraphRuntime::new());
        let host = MemoryHost::new();
        let name = Ref::new("a".to_string()).unwrap();

        let unmount = text_with(name.clone()).mount(&host).unwrap().unwrap();
        assert_eq!(host.render(), "a");

        name.set("b".to_string());
        assert_eq!(host.render(), "b");

        unmount();
        name.set("c".to_string());
        assert!(host.texts().is_empty());
        assert!(!host
            .ops()
            .iter()
            .any(|op| matches!(op, HostOp::SetText { text, .. } if text == "c")));
    }
}

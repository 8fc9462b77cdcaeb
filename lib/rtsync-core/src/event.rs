//! Node change notifications carried through the work queue

use std::fmt;

/// Identity of a node; the controller does not look at node content
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub name: String,
}

impl NodeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeEventKind {
    Added,
    Updated,
    Deleted,
}

impl NodeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeEventKind::Added => "added",
            NodeEventKind::Updated => "updated",
            NodeEventKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for NodeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node changed. Every kind triggers the same reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeEvent {
    pub kind: NodeEventKind,
    pub node: NodeRef,
}

impl NodeEvent {
    pub fn added(name: impl Into<String>) -> Self {
        Self { kind: NodeEventKind::Added, node: NodeRef::new(name) }
    }

    pub fn updated(name: impl Into<String>) -> Self {
        Self { kind: NodeEventKind::Updated, node: NodeRef::new(name) }
    }

    pub fn deleted(name: impl Into<String>) -> Self {
        Self { kind: NodeEventKind::Deleted, node: NodeRef::new(name) }
    }
}

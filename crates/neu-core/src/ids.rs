//! Typed identifiers. Each newtype is constructed only by the component that
//! owns the corresponding allocation sequence (the node registry for `NodeId`,
//! a connection's accept loop for `PeerFd`, ...) — never via a bare `static`.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Monotonic, stable-across-restarts identifier for a `Node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generator for `NodeId`s, owned exclusively by the node registry.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: AtomicU32,
}

impl NodeIdAllocator {
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    pub fn allocate(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifier for a `Tag`, unique within the owning node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TagId(pub u64);

#[derive(Debug, Default)]
pub struct TagIdAllocator {
    next: AtomicU64,
}

impl TagIdAllocator {
    pub fn allocate(&self) -> TagId {
        TagId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// A queue descriptor handed out by the connection abstraction / scheduler,
/// akin to a file descriptor but scoped to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QDesc(pub u32);

impl fmt::Display for QDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qd#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct QDescAllocator {
    next: AtomicU32,
}

impl QDescAllocator {
    pub fn allocate(&self) -> QDesc {
        QDesc(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocators_hand_out_distinct_increasing_ids() {
        let a = NodeIdAllocator::starting_at(1);
        let first = a.allocate();
        let second = a.allocate();
        assert_eq!(first, NodeId(1));
        assert_eq!(second, NodeId(2));
    }
}

//! Explicit system context, passed by `Arc` to every component that used to
//! reach a global mutable singleton (metrics registry, id allocators).
//! No `static` lives in this crate; construction happens once at startup in
//! the gateway binary and the `Arc<SystemContext>` is threaded everywhere.

use std::sync::Arc;

use crate::ids::{NodeIdAllocator, QDescAllocator, TagIdAllocator};
use crate::metrics::MetricsRegistry;

pub struct SystemContext {
    pub metrics: MetricsRegistry,
    pub node_ids: NodeIdAllocator,
    pub tag_ids: TagIdAllocator,
    pub qdescs: QDescAllocator,
}

impl SystemContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            metrics: MetricsRegistry::new(),
            node_ids: NodeIdAllocator::starting_at(1),
            tag_ids: TagIdAllocator::default(),
            qdescs: QDescAllocator::default(),
        })
    }
}

impl Default for SystemContext {
    fn default() -> Self {
        Self {
            metrics: MetricsRegistry::new(),
            node_ids: NodeIdAllocator::starting_at(1),
            tag_ids: TagIdAllocator::default(),
            qdescs: QDescAllocator::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_allocates_from_one() {
        let ctx = SystemContext::new();
        assert_eq!(ctx.node_ids.allocate().0, 1);
    }
}

//! Resource handles and per-frame resource slots for the render graph

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};

use super::pass::PassHandle;

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a render graph instance.
///
/// Handles carry the id of the graph that created them so a graph can reject
/// handles that belong to another graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(u32);

impl GraphId {
    pub(crate) fn next() -> Self {
        Self(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a resource produced by a pass.
///
/// A small index into the graph's resource table. `Copy` and only valid
/// within the graph that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    graph: GraphId,
    index: u32,
}

impl ResourceHandle {
    pub(crate) fn new(graph: GraphId, index: u32) -> Self {
        Self { graph, index }
    }

    pub(crate) fn graph(self) -> GraphId {
        self.graph
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

/// Metadata about a resource in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Output name on the producing pass
    pub name: String,
    /// The only pass that writes this resource
    pub producer: PassHandle,
}

/// Per-frame storage for pass outputs, indexed by [`ResourceHandle`].
///
/// Every slot is empty at the start of a frame and may be written once.
#[derive(Default)]
pub struct ResourceSlots {
    slots: Vec<Option<Box<dyn Any + Send + Sync>>>,
}

impl ResourceSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every slot and size the arena for `len` resources.
    pub(crate) fn reset(&mut self, len: usize) {
        self.slots.clear();
        self.slots.resize_with(len, || None);
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn is_written(&self, resource: ResourceHandle) -> bool {
        matches!(self.slots.get(resource.index()), Some(Some(_)))
    }

    /// Number of slots currently holding a value.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn get(&self, resource: ResourceHandle) -> Option<&(dyn Any + Send + Sync)> {
        self.slots.get(resource.index())?.as_deref()
    }

    /// Store a value. Returns `false` if the slot was already written this frame.
    pub(crate) fn write(
        &mut self,
        resource: ResourceHandle,
        value: Box<dyn Any + Send + Sync>,
    ) -> bool {
        if resource.index() >= self.slots.len() {
            self.slots.resize_with(resource.index() + 1, || None);
        }
        let slot = &mut self.slots[resource.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub(crate) fn release(&mut self, resource: ResourceHandle) {
        if let Some(slot) = self.slots.get_mut(resource.index()) {
            *slot = None;
        }
    }
}

impl std::fmt::Debug for ResourceSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSlots")
            .field("len", &self.slots.len())
            .field("live", &self.live_count())
            .finish()
    }
}

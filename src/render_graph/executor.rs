//! Render graph executor

use std::any::Any;

use crate::compiler::CompiledGraph;
use crate::error::{GraphError, GraphResult};
use crate::frame::FrameContext;

use super::pass::{PassExecuteContext, PassNode, RenderPass};
use super::resource::{ResourceHandle, ResourceSlots};

/// Executor for running a compiled render graph.
///
/// Owns the per-frame resource slots. Every frame starts with all slots
/// empty; a failed frame leaves them empty.
#[derive(Debug, Default)]
pub struct RenderGraphExecutor {
    slots: ResourceSlots,
    release_transient: bool,
}

impl RenderGraphExecutor {
    pub fn new(release_transient: bool) -> Self {
        Self {
            slots: ResourceSlots::new(),
            release_transient,
        }
    }

    /// Run every pass of `compiled` in order.
    ///
    /// `passes` and `nodes` are indexed by pass handle and must belong to the
    /// graph `compiled` was built from.
    pub(crate) fn execute(
        &mut self,
        passes: &mut [Box<dyn RenderPass>],
        nodes: &[PassNode],
        compiled: &CompiledGraph,
        resource_count: usize,
        frame: &FrameContext,
    ) -> GraphResult<()> {
        self.slots.reset(resource_count);

        let result = self.run_passes(passes, nodes, compiled, frame);
        if result.is_err() {
            self.slots.clear();
        }
        result
    }

    fn run_passes(
        &mut self,
        passes: &mut [Box<dyn RenderPass>],
        nodes: &[PassNode],
        compiled: &CompiledGraph,
        frame: &FrameContext,
    ) -> GraphResult<()> {
        for (step, &handle) in compiled.pass_order().iter().enumerate() {
            let node = &nodes[handle.index()];
            let pass = &mut passes[handle.index()];

            log::trace!("Frame {}: executing pass '{}'", frame.frame_index, node.name);

            let mut ctx = PassExecuteContext::new(frame, node, &mut self.slots);
            pass.execute(&mut ctx)
                .map_err(|source| GraphError::PassFailed {
                    pass: node.name.clone(),
                    source,
                })?;

            if let Some(missing) = node
                .outputs
                .iter()
                .find(|slot| !self.slots.is_written(slot.resource))
            {
                return Err(GraphError::MissingOutput {
                    pass: node.name.clone(),
                    output: missing.name.clone(),
                });
            }

            if self.release_transient {
                for &resource in compiled.releases_after(step) {
                    self.slots.release(resource);
                }
            }
        }

        Ok(())
    }

    /// Get a resource produced during the last frame, if still held.
    pub fn resource<T: Any>(&self, resource: ResourceHandle) -> Option<&T> {
        self.slots.get(resource)?.downcast_ref::<T>()
    }

    pub fn slots(&self) -> &ResourceSlots {
        &self.slots
    }

    /// Drop every resource held from the last frame.
    pub fn cleanup(&mut self) {
        self.slots.clear();
    }
}

//! Converts device depth into view-space distance

use std::any::Any;

use crate::error::PassError;
use crate::render_graph::{PassExecuteContext, PassSetupContext, RenderPass};

use super::depth_prepass::DepthBuffer;

/// Linearize depth pass.
///
/// Reads a [`DepthBuffer`] of device depth and writes one of view-space
/// distances using the frame camera's near and far planes. Cleared texels
/// map to the far plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearizeDepthPass;

impl LinearizeDepthPass {
    pub const INPUT: &'static str = "depth";
    pub const OUTPUT: &'static str = "linear";

    pub fn new() -> Self {
        Self
    }
}

impl RenderPass for LinearizeDepthPass {
    fn name(&self) -> &str {
        "linearize_depth"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.input(Self::INPUT).output(Self::OUTPUT);
    }

    fn execute(&mut self, ctx: &mut PassExecuteContext) -> Result<(), PassError> {
        let camera = ctx.frame().camera;
        if camera.far <= camera.near {
            return Err(PassError::Failed(format!(
                "invalid depth range {}..{}",
                camera.near, camera.far
            )));
        }

        let depth = ctx.input::<DepthBuffer>(Self::INPUT)?;
        let linear = depth.map(|z| camera.linearize_depth(z));
        ctx.write_output(Self::OUTPUT, linear)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

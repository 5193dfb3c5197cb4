//! Depth pre-pass producing a device depth buffer

use std::any::Any;

use glam::UVec2;

use crate::error::PassError;
use crate::render_graph::{PassExecuteContext, PassSetupContext, RenderPass};

/// A single-channel `f32` depth image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthBuffer {
    /// Create a buffer with every texel set to `clear_value`.
    pub fn new(width: u32, height: u32, clear_value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![clear_value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(self.texel_index(x, y)).copied()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Raw texel bytes, e.g. for a texture upload by the presenter.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Apply `f` to every texel.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&texel| f(texel)).collect(),
        }
    }

    /// Write `depth` where it is closer than the stored value.
    fn test_and_write(&mut self, x: u32, y: u32, depth: f32) {
        let index = self.texel_index(x, y);
        if let Some(texel) = self.data.get_mut(index) {
            if depth < *texel {
                *texel = depth;
            }
        }
    }

    fn texel_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Screen-aligned rectangle at a constant depth.
///
/// The depth is the world point `(0, 0, -distance)` seen through the frame
/// camera's view and projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthQuad {
    /// Top-left texel, inclusive
    pub min: UVec2,
    /// Bottom-right texel, exclusive
    pub max: UVec2,
    /// Distance along world -Z
    pub distance: f32,
}

impl DepthQuad {
    pub fn new(min: [u32; 2], max: [u32; 2], distance: f32) -> Self {
        Self {
            min: UVec2::from(min),
            max: UVec2::from(max),
            distance,
        }
    }
}

/// Depth pre-pass.
///
/// Clears a depth buffer the size of the frame and rasterizes its quads with
/// a less-than depth test. Quads outside the camera's near/far range are
/// clipped.
#[derive(Debug, Clone, Default)]
pub struct DepthPass {
    quads: Vec<DepthQuad>,
}

impl DepthPass {
    pub const OUTPUT: &'static str = "depth";
    pub const CLEAR_DEPTH: f32 = 1.0;

    pub fn new(quads: Vec<DepthQuad>) -> Self {
        Self { quads }
    }

    pub fn quads(&self) -> &[DepthQuad] {
        &self.quads
    }

    /// Replace the geometry drawn by the next frames.
    pub fn set_quads(&mut self, quads: Vec<DepthQuad>) {
        self.quads = quads;
    }
}

impl RenderPass for DepthPass {
    fn name(&self) -> &str {
        "depth_prepass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.output(Self::OUTPUT);
    }

    fn execute(&mut self, ctx: &mut PassExecuteContext) -> Result<(), PassError> {
        let frame = ctx.frame();
        let camera = &frame.camera;
        let mut depth = DepthBuffer::new(frame.width, frame.height, Self::CLEAR_DEPTH);

        for quad in &self.quads {
            let view_distance = camera.view_distance(quad.distance);
            if view_distance < camera.near || view_distance > camera.far {
                continue;
            }

            let value = camera.project_depth(quad.distance).clamp(0.0, 1.0);
            let max = quad.max.min(UVec2::new(frame.width, frame.height));
            for y in quad.min.y..max.y {
                for x in quad.min.x..max.x {
                    depth.test_and_write(x, y, value);
                }
            }
        }

        ctx.write_output(Self::OUTPUT, depth)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

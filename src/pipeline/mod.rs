//! Built-in passes and the depth pipeline
//!
//! 1. Depth pre-pass - rasterizes quads into a device depth buffer
//! 2. Linearize depth - converts device depth to view-space distance

pub mod depth_prepass;
pub mod linearize_depth;

pub use depth_prepass::{DepthBuffer, DepthPass, DepthQuad};
pub use linearize_depth::LinearizeDepthPass;

use crate::error::GraphResult;
use crate::render_graph::{PassHandle, RenderGraph, ResourceHandle};
use crate::RenderGraphConfig;

/// Passes and resources created by [`build_depth_graph`]
#[derive(Debug, Clone, Copy)]
pub struct DepthGraphResources {
    pub depth_pass: PassHandle,
    pub linearize_pass: PassHandle,
    pub depth: ResourceHandle,
    pub linear: ResourceHandle,
}

/// Build the depth -> linearize graph with the linear depth as graph output.
pub fn build_depth_graph(
    quads: Vec<DepthQuad>,
    config: RenderGraphConfig,
) -> GraphResult<(RenderGraph, DepthGraphResources)> {
    let mut graph = RenderGraph::with_config(config);

    let depth_pass = graph.create_pass(DepthPass::new(quads))?;
    let linearize_pass = graph.create_pass(LinearizeDepthPass::new())?;

    let depth = graph.pass_output(depth_pass, DepthPass::OUTPUT)?;
    graph.set_input(linearize_pass, LinearizeDepthPass::INPUT, depth)?;

    let linear = graph.pass_output(linearize_pass, LinearizeDepthPass::OUTPUT)?;
    graph.set_output(linear)?;

    let resources = DepthGraphResources {
        depth_pass,
        linearize_pass,
        depth,
        linear,
    };

    Ok((graph, resources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GraphError, PassError};
    use crate::frame::{Camera, FrameContext};

    #[test]
    fn test_depth_graph_order() {
        let (mut graph, resources) =
            build_depth_graph(Vec::new(), RenderGraphConfig::default()).unwrap();
        let compiled = graph.compile().unwrap();
        assert_eq!(
            compiled.pass_order(),
            &[resources.depth_pass, resources.linearize_pass]
        );
    }

    #[test]
    fn test_linear_depth_matches_distance() {
        let (mut graph, resources) = build_depth_graph(
            vec![
                DepthQuad::new([0, 0], [2, 4], 3.0),
                DepthQuad::new([2, 0], [4, 4], 12.5),
            ],
            RenderGraphConfig::default(),
        )
        .unwrap();

        let frame = FrameContext::new(4, 4, Camera::perspective(1.0, 1.0, 0.1, 50.0));
        graph.execute(&frame).unwrap();

        let linear = graph.output_resource::<DepthBuffer>().unwrap();
        assert!((linear.get(0, 0).unwrap() - 3.0).abs() < 1e-2);
        assert!((linear.get(3, 3).unwrap() - 12.5).abs() < 1e-2);

        // The device depth was transient and released after linearization
        assert!(graph.resource::<DepthBuffer>(resources.depth).is_none());
    }

    #[test]
    fn test_cleared_texels_map_to_far_plane() {
        let (mut graph, _) = build_depth_graph(Vec::new(), RenderGraphConfig::default()).unwrap();
        let frame = FrameContext::new(2, 2, Camera::perspective(1.0, 1.0, 0.5, 20.0));
        graph.execute(&frame).unwrap();

        let linear = graph.output_resource::<DepthBuffer>().unwrap();
        assert!(linear.data().iter().all(|&texel| (texel - 20.0).abs() < 1e-3));
    }

    #[test]
    fn test_invalid_depth_range_fails_frame() {
        let (mut graph, _) = build_depth_graph(Vec::new(), RenderGraphConfig::default()).unwrap();
        let mut camera = Camera::perspective(1.0, 1.0, 0.5, 20.0);
        camera.far = camera.near;
        let frame = FrameContext::new(2, 2, camera);

        assert!(matches!(
            graph.execute(&frame),
            Err(GraphError::PassFailed {
                source: PassError::Failed(_),
                ..
            })
        ));
        assert!(graph.output_resource::<DepthBuffer>().is_none());
    }

    #[test]
    fn test_quads_updated_between_frames() {
        let (mut graph, resources) =
            build_depth_graph(Vec::new(), RenderGraphConfig::default()).unwrap();
        let frame = FrameContext::new(1, 1, Camera::perspective(1.0, 1.0, 0.1, 100.0));
        graph.execute(&frame).unwrap();

        graph
            .pass_mut::<DepthPass>(resources.depth_pass)
            .unwrap()
            .set_quads(vec![DepthQuad::new([0, 0], [1, 1], 7.0)]);
        graph.execute(&frame).unwrap();

        let linear = graph.output_resource::<DepthBuffer>().unwrap();
        assert!((linear.get(0, 0).unwrap() - 7.0).abs() < 1e-2);
        assert_eq!(graph.frame_count(), 2);
    }
}

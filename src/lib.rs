//! RedLilium Render Graph - declarative pass scheduling for a frame.
//!
//! A [`RenderGraph`] owns a set of passes. Every pass declares named inputs
//! and named outputs during setup; inputs are bound to outputs of other passes
//! and those bindings become the edges of the graph. The graph then:
//! - Compiles into a stable execution order (producers before consumers)
//! - Detects dependency cycles and unbound inputs
//! - Optionally prunes passes that do not contribute to the designated output
//! - Executes passes once per frame, routing resources through per-frame slots
//!
//! # Example
//!
//! ```ignore
//! use redlilium_render_graph::{Camera, FrameContext, RenderGraph};
//! use redlilium_render_graph::pipeline::{DepthPass, DepthQuad, LinearizeDepthPass};
//!
//! let mut graph = RenderGraph::new();
//! let depth = graph.create_pass(DepthPass::new(vec![DepthQuad::new([0, 0], [64, 64], 5.0)]))?;
//! let linearize = graph.create_pass(LinearizeDepthPass::new())?;
//! graph.bind(linearize, LinearizeDepthPass::INPUT, depth, DepthPass::OUTPUT)?;
//! graph.set_output(graph.pass_output(linearize, LinearizeDepthPass::OUTPUT)?)?;
//!
//! let frame = FrameContext::new(64, 64, Camera::perspective(1.0, 1.0, 0.1, 100.0));
//! graph.execute(&frame)?;
//! ```

pub mod compiler;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod render_graph;

pub use compiler::{CompilationMode, CompiledGraph, ResourceLifetime};
pub use error::{BindingError, GraphError, GraphResult, PassError};
pub use frame::{Camera, FrameContext};
pub use render_graph::{
    CallbackPass, GraphId, InputSlot, OutputSlot, PassExecuteContext, PassHandle, PassNode,
    PassSetupContext, RenderGraph, RenderGraphExecutor, RenderPass, ResourceHandle, ResourceInfo,
    ResourceSlots,
};

/// Render graph library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the render graph subsystem.
///
/// Only logs the library version; there is no global state to set up.
pub fn init() {
    log::info!("RedLilium Render Graph v{} initialized", VERSION);
}

/// Configuration for a [`RenderGraph`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderGraphConfig {
    /// Label used in log messages
    pub label: String,
    /// Which passes a compile keeps
    pub compilation_mode: CompilationMode,
    /// Compile as soon as the graph output is assigned
    pub compile_on_set_output: bool,
    /// Drop resources after their last consumer ran (the graph output is always kept)
    pub release_transient_resources: bool,
}

impl Default for RenderGraphConfig {
    fn default() -> Self {
        Self {
            label: "render_graph".to_string(),
            compilation_mode: CompilationMode::Full,
            compile_on_set_output: false,
            release_transient_resources: true,
        }
    }
}

//! Render Graph System
//!
//! Passes declare named inputs and outputs. Binding an input to another
//! pass's output creates a data dependency; the graph orders passes so that
//! producers run before consumers and routes each output to its readers
//! through per-frame resource slots.

pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use executor::RenderGraphExecutor;
pub use graph::RenderGraph;
pub use pass::{
    CallbackPass, InputSlot, OutputSlot, PassExecuteContext, PassHandle, PassNode,
    PassSetupContext, RenderPass,
};
pub use resource::{GraphId, ResourceHandle, ResourceInfo, ResourceSlots};

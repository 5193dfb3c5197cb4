//! Render pass definitions for the render graph

use std::any::Any;

use crate::error::PassError;
use crate::frame::FrameContext;

use super::resource::{GraphId, ResourceHandle, ResourceSlots};

/// Handle to a pass in the render graph.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is only valid within
/// the `RenderGraph` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassHandle {
    graph: GraphId,
    index: u32,
}

impl PassHandle {
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

/// Context for declaring pass inputs and outputs
#[derive(Debug, Default)]
pub struct PassSetupContext {
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl PassSetupContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Declare a named input. It must be bound before the graph compiles.
    pub fn input(&mut self, name: impl Into<String>) -> &mut Self {
        self.inputs.push(name.into());
        self
    }

    /// Declare a named output. The graph allocates a resource handle for it.
    pub fn output(&mut self, name: impl Into<String>) -> &mut Self {
        self.outputs.push(name.into());
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.inputs, self.outputs)
    }
}

/// Context for executing a render pass
pub struct PassExecuteContext<'a> {
    frame: &'a FrameContext,
    node: &'a PassNode,
    slots: &'a mut ResourceSlots,
}

impl<'a> PassExecuteContext<'a> {
    pub(crate) fn new(
        frame: &'a FrameContext,
        node: &'a PassNode,
        slots: &'a mut ResourceSlots,
    ) -> Self {
        Self { frame, node, slots }
    }

    pub fn frame(&self) -> &'a FrameContext {
        self.frame
    }

    pub fn pass_name(&self) -> &str {
        &self.node.name
    }

    /// Check whether a declared input holds a value this frame.
    pub fn has_input(&self, name: &str) -> bool {
        self.node
            .input(name)
            .and_then(|slot| slot.binding)
            .is_some_and(|resource| self.slots.is_written(resource))
    }

    /// Get the value produced upstream for a declared input.
    pub fn input<T: Any>(&self, name: &str) -> Result<&T, PassError> {
        let slot = self
            .node
            .input(name)
            .ok_or_else(|| PassError::UnknownInput(name.to_string()))?;
        let value = slot
            .binding
            .and_then(|resource| self.slots.get(resource))
            .ok_or_else(|| PassError::MissingInput(name.to_string()))?;

        value
            .downcast_ref::<T>()
            .ok_or_else(|| PassError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Write a declared output. Each output can be written once per frame.
    pub fn write_output<T: Any + Send + Sync>(
        &mut self,
        name: &str,
        value: T,
    ) -> Result<(), PassError> {
        let slot = self
            .node
            .output(name)
            .ok_or_else(|| PassError::UnknownOutput(name.to_string()))?;

        if self.slots.write(slot.resource, Box::new(value)) {
            Ok(())
        } else {
            Err(PassError::OutputAlreadyWritten(name.to_string()))
        }
    }
}

/// Trait for render passes
pub trait RenderPass: Send + Sync {
    /// Get the pass name for debugging
    fn name(&self) -> &str;

    /// Setup phase - declare named inputs and outputs
    fn setup(&mut self, ctx: &mut PassSetupContext);

    /// Execute phase - read inputs, write every declared output
    fn execute(&mut self, ctx: &mut PassExecuteContext) -> Result<(), PassError>;

    /// Allow downcasting
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A declared input of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSlot {
    pub name: String,
    pub binding: Option<ResourceHandle>,
}

/// A declared output of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSlot {
    pub name: String,
    pub resource: ResourceHandle,
}

/// Metadata about a pass in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassNode {
    pub name: String,
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<OutputSlot>,
}

impl PassNode {
    pub fn input(&self, name: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputSlot> {
        self.outputs.iter().find(|slot| slot.name == name)
    }

    pub fn reads_resource(&self, resource: ResourceHandle) -> bool {
        self.inputs.iter().any(|slot| slot.binding == Some(resource))
    }

    pub fn writes_resource(&self, resource: ResourceHandle) -> bool {
        self.outputs.iter().any(|slot| slot.resource == resource)
    }
}

type ExecuteFn =
    dyn FnMut(&mut PassExecuteContext<'_>) -> Result<(), PassError> + Send + Sync + 'static;

fn skip(_: &mut PassExecuteContext<'_>) -> Result<(), PassError> {
    Ok(())
}

/// A pass driven by a closure.
///
/// ```ignore
/// let blur = graph.create_pass(
///     CallbackPass::new("blur")
///         .with_input("color")
///         .with_output("blurred")
///         .on_execute(|ctx| {
///             let color = *ctx.input::<f32>("color")?;
///             ctx.write_output("blurred", color * 0.5)
///         }),
/// )?;
/// ```
pub struct CallbackPass {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    callback: Box<ExecuteFn>,
}

impl CallbackPass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            callback: Box::new(skip),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn on_execute<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut PassExecuteContext<'_>) -> Result<(), PassError> + Send + Sync + 'static,
    {
        self.callback = Box::new(callback);
        self
    }
}

impl std::fmt::Debug for CallbackPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackPass")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl RenderPass for CallbackPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        for input in &self.inputs {
            ctx.input(input.clone());
        }
        for output in &self.outputs {
            ctx.output(output.clone());
        }
    }

    fn execute(&mut self, ctx: &mut PassExecuteContext) -> Result<(), PassError> {
        (self.callback)(ctx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//! Render graph definition

use std::any::Any;

use crate::compiler::{self, CompilationMode, CompiledGraph};
use crate::error::{BindingError, GraphError, GraphResult};
use crate::frame::FrameContext;
use crate::RenderGraphConfig;

use super::executor::RenderGraphExecutor;
use super::pass::{InputSlot, OutputSlot, PassHandle, PassNode, PassSetupContext, RenderPass};
use super::resource::{GraphId, ResourceHandle, ResourceInfo};

/// The main render graph structure.
///
/// # Construction
///
/// ```ignore
/// let mut graph = RenderGraph::new();
/// let depth = graph.create_pass(DepthPass::new(quads))?;
/// let linearize = graph.create_pass(LinearizeDepthPass::new())?;
/// graph.set_input(linearize, "depth", graph.pass_output(depth, "depth")?)?;
/// graph.set_output(graph.pass_output(linearize, "linear")?)?;
/// ```
///
/// # Execution
///
/// ```ignore
/// graph.execute(&frame)?;
/// let linear = graph.output_resource::<DepthBuffer>();
/// ```
///
/// The graph compiles on the first `execute` (or on `set_output` when
/// [`RenderGraphConfig::compile_on_set_output`] is set). Changing passes,
/// bindings, dependencies or the output after a compile makes the graph
/// stale: `execute` then fails with [`GraphError::StaleTopology`] until
/// [`compile`](Self::compile) is called again.
pub struct RenderGraph {
    id: GraphId,
    config: RenderGraphConfig,
    passes: Vec<Box<dyn RenderPass>>,
    pass_nodes: Vec<PassNode>,
    resources: Vec<ResourceInfo>,
    /// Ordering-only edges stored as (dependent, dependency) pairs.
    dependencies: Vec<(PassHandle, PassHandle)>,
    output: Option<ResourceHandle>,
    compiled: Option<CompiledGraph>,
    stale: bool,
    executor: RenderGraphExecutor,
    frame_count: u64,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::with_config(RenderGraphConfig::default())
    }

    pub fn with_config(config: RenderGraphConfig) -> Self {
        Self {
            id: GraphId::next(),
            executor: RenderGraphExecutor::new(config.release_transient_resources),
            config,
            passes: Vec::new(),
            pass_nodes: Vec::new(),
            resources: Vec::new(),
            dependencies: Vec::new(),
            output: None,
            compiled: None,
            stale: false,
            frame_count: 0,
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn config(&self) -> &RenderGraphConfig {
        &self.config
    }

    /// Add a render pass to the graph.
    ///
    /// Runs the pass setup and allocates a resource handle for every
    /// declared output. The pass starts with all inputs unbound.
    pub fn create_pass<P: RenderPass + 'static>(&mut self, mut pass: P) -> GraphResult<PassHandle> {
        let mut ctx = PassSetupContext::new();
        pass.setup(&mut ctx);
        let (inputs, outputs) = ctx.into_parts();
        let name = pass.name().to_string();

        if let Some(output) = first_duplicate(&outputs) {
            return Err(GraphError::DuplicateOutput {
                pass: name,
                output: output.clone(),
            });
        }
        if let Some(input) = first_duplicate(&inputs) {
            return Err(GraphError::DuplicateInput {
                pass: name,
                input: input.clone(),
            });
        }

        let handle = PassHandle::new(self.id, self.passes.len() as u32);

        let mut output_slots = Vec::with_capacity(outputs.len());
        for output in outputs {
            let resource = ResourceHandle::new(self.id, self.resources.len() as u32);
            self.resources.push(ResourceInfo {
                name: output.clone(),
                producer: handle,
            });
            output_slots.push(OutputSlot {
                name: output,
                resource,
            });
        }

        let input_slots = inputs
            .into_iter()
            .map(|input| InputSlot {
                name: input,
                binding: None,
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Render graph '{}': created pass '{}' ({} inputs, {} outputs)",
            self.config.label,
            name,
            input_slots.len(),
            output_slots.len()
        );

        self.passes.push(Box::new(pass));
        self.pass_nodes.push(PassNode {
            name,
            inputs: input_slots,
            outputs: output_slots,
        });
        self.invalidate();

        Ok(handle)
    }

    /// Get the resource handle of a named pass output.
    pub fn pass_output(&self, pass: PassHandle, output: &str) -> GraphResult<ResourceHandle> {
        let node = self.node(pass)?;
        node.output(output)
            .map(|slot| slot.resource)
            .ok_or_else(|| {
                BindingError::UnknownOutput {
                    pass: node.name.clone(),
                    output: output.to_string(),
                }
                .into()
            })
    }

    /// Bind a named input of `consumer` to `resource`.
    ///
    /// Replaces any previous binding of that input.
    pub fn set_input(
        &mut self,
        consumer: PassHandle,
        input: &str,
        resource: ResourceHandle,
    ) -> GraphResult<()> {
        self.node(consumer)?;
        if self.resource_info(resource).is_none() {
            return Err(BindingError::ForeignResource(resource).into());
        }

        let node = &mut self.pass_nodes[consumer.index()];
        let Some(position) = node.inputs.iter().position(|slot| slot.name == input) else {
            return Err(BindingError::UnknownInput {
                pass: node.name.clone(),
                input: input.to_string(),
            }
            .into());
        };
        node.inputs[position].binding = Some(resource);

        let info = &self.resources[resource.index()];
        log::debug!(
            "Render graph '{}': bound '{}.{}' to '{}.{}'",
            self.config.label,
            self.pass_nodes[consumer.index()].name,
            input,
            self.pass_nodes[info.producer.index()].name,
            info.name
        );

        self.invalidate();
        Ok(())
    }

    /// Bind a named input of `consumer` to a named output of `producer`.
    pub fn bind(
        &mut self,
        consumer: PassHandle,
        input: &str,
        producer: PassHandle,
        output: &str,
    ) -> GraphResult<()> {
        self.node(consumer)?;
        let resource = self.pass_output(producer, output)?;
        self.set_input(consumer, input, resource)
    }

    /// Add an ordering dependency between passes without a resource.
    ///
    /// The `dependent` pass will execute after the `dependency` pass.
    pub fn add_dependency(&mut self, dependent: PassHandle, dependency: PassHandle) -> GraphResult<()> {
        self.node(dependent)?;
        self.node(dependency)?;

        let exists = self
            .dependencies
            .iter()
            .any(|&(d, dep)| d == dependent && dep == dependency);
        if !exists {
            self.dependencies.push((dependent, dependency));
            self.invalidate();
        }
        Ok(())
    }

    /// Designate the graph output.
    ///
    /// Compiles the graph right away when `compile_on_set_output` is configured.
    /// If that compile fails the previous output is kept, and the graph has
    /// no compile result.
    pub fn set_output(&mut self, resource: ResourceHandle) -> GraphResult<()> {
        if self.resource_info(resource).is_none() {
            return Err(GraphError::UnknownResource(resource));
        }

        let previous = self.output.replace(resource);
        self.invalidate();

        if self.config.compile_on_set_output {
            if let Err(err) = self.compile().map(|_| ()) {
                self.output = previous;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Get the designated graph output.
    pub fn output(&self) -> Option<ResourceHandle> {
        self.output
    }

    /// Compile the graph with the configured compilation mode.
    pub fn compile(&mut self) -> GraphResult<&CompiledGraph> {
        self.compile_with_mode(self.config.compilation_mode)
    }

    /// Compile the graph, replacing any previous compile result.
    ///
    /// On failure the graph has no compile result and `execute` keeps
    /// failing until the graph is fixed.
    pub fn compile_with_mode(&mut self, mode: CompilationMode) -> GraphResult<&CompiledGraph> {
        self.compiled = None;
        self.stale = false;
        self.executor.cleanup();

        self.verify_declarations()?;
        let compiled = compiler::compile(self, mode)?;
        Ok(&*self.compiled.insert(compiled))
    }

    /// Get the last compile result.
    pub fn compiled(&self) -> Option<&CompiledGraph> {
        self.compiled.as_ref()
    }

    /// Check whether the topology changed since the last compile.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Execute one frame.
    ///
    /// Compiles first if the graph was never compiled. A failing pass aborts
    /// the frame and no resource of that frame stays readable.
    pub fn execute(&mut self, frame: &FrameContext) -> GraphResult<()> {
        if self.stale {
            return Err(GraphError::StaleTopology);
        }
        if self.compiled.is_none() {
            self.compile()?;
        }
        let Some(compiled) = &self.compiled else {
            return Err(GraphError::StaleTopology);
        };

        let result = self.executor.execute(
            &mut self.passes,
            &self.pass_nodes,
            compiled,
            self.resources.len(),
            frame,
        );

        match &result {
            Ok(()) => self.frame_count += 1,
            Err(err) => log::warn!(
                "Render graph '{}': frame {} failed: {}",
                self.config.label,
                frame.frame_index,
                err
            ),
        }
        result
    }

    /// Number of frames executed successfully.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the graph output produced by the last frame.
    pub fn output_resource<T: Any>(&self) -> Option<&T> {
        self.resource(self.output?)
    }

    /// Get a resource produced by the last frame.
    ///
    /// Returns `None` for foreign handles, type mismatches, and transient
    /// resources already released.
    pub fn resource<T: Any>(&self, resource: ResourceHandle) -> Option<&T> {
        if resource.graph() != self.id {
            return None;
        }
        self.executor.resource(resource)
    }

    /// Get a pass as its concrete type.
    pub fn pass<P: RenderPass + 'static>(&self, handle: PassHandle) -> Option<&P> {
        let index = self.node(handle).ok().map(|_| handle.index())?;
        self.passes[index].as_any().downcast_ref::<P>()
    }

    /// Get a pass as its concrete type for parameter updates.
    ///
    /// Pass parameters do not affect topology, so this keeps the compile result.
    /// Callers must not change what the pass declares in `setup`; the next
    /// compile rejects such a pass with [`GraphError::DeclarationsChanged`].
    pub fn pass_mut<P: RenderPass + 'static>(&mut self, handle: PassHandle) -> Option<&mut P> {
        let index = self.node(handle).ok().map(|_| handle.index())?;
        self.passes[index].as_any_mut().downcast_mut::<P>()
    }

    /// Get the number of passes in the graph.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_name(&self, handle: PassHandle) -> Option<&str> {
        self.pass_node(handle).map(|node| node.name.as_str())
    }

    /// Get pass node by handle
    pub fn pass_node(&self, handle: PassHandle) -> Option<&PassNode> {
        self.node(handle).ok()
    }

    /// Get pass nodes (metadata) in insertion order
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.pass_nodes
    }

    /// Get all resources in allocation order
    pub fn resources(&self) -> &[ResourceInfo] {
        &self.resources
    }

    pub fn resource_info(&self, resource: ResourceHandle) -> Option<&ResourceInfo> {
        if resource.graph() != self.id {
            return None;
        }
        self.resources.get(resource.index())
    }

    /// Dependency edges as (dependent, dependency) pairs.
    ///
    /// Contains one edge per distinct producer of each pass's bound inputs,
    /// in pass insertion order, followed by the explicit dependencies.
    pub fn edges(&self) -> Vec<(PassHandle, PassHandle)> {
        let mut edges = Vec::new();
        for (index, node) in self.pass_nodes.iter().enumerate() {
            let dependent = PassHandle::new(self.id, index as u32);
            for resource in node.inputs.iter().filter_map(|slot| slot.binding) {
                let edge = (dependent, self.resources[resource.index()].producer);
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }
        for &edge in &self.dependencies {
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
        edges
    }

    /// Remove every pass and resource.
    ///
    /// Handles created before the clear no longer belong to this graph.
    pub fn clear(&mut self) {
        self.id = GraphId::next();
        self.passes.clear();
        self.pass_nodes.clear();
        self.resources.clear();
        self.dependencies.clear();
        self.output = None;
        self.compiled = None;
        self.stale = false;
        self.frame_count = 0;
        self.executor.cleanup();
    }

    fn node(&self, handle: PassHandle) -> Result<&PassNode, BindingError> {
        if handle.graph() != self.id {
            return Err(BindingError::ForeignPass(handle));
        }
        self.pass_nodes
            .get(handle.index())
            .ok_or(BindingError::ForeignPass(handle))
    }

    /// Re-run every pass setup and compare with the recorded slots.
    fn verify_declarations(&mut self) -> GraphResult<()> {
        for (pass, node) in self.passes.iter_mut().zip(&self.pass_nodes) {
            let mut ctx = PassSetupContext::new();
            pass.setup(&mut ctx);
            let (inputs, outputs) = ctx.into_parts();

            let inputs_match = inputs.len() == node.inputs.len()
                && inputs.iter().zip(&node.inputs).all(|(name, slot)| *name == slot.name);
            let outputs_match = outputs.len() == node.outputs.len()
                && outputs.iter().zip(&node.outputs).all(|(name, slot)| *name == slot.name);
            if !inputs_match || !outputs_match {
                return Err(GraphError::DeclarationsChanged {
                    pass: node.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        if self.compiled.is_some() {
            self.stale = true;
        }
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("id", &self.id)
            .field("label", &self.config.label)
            .field("passes", &self.pass_nodes)
            .field("output", &self.output)
            .field("stale", &self.stale)
            .finish_non_exhaustive()
    }
}

fn first_duplicate(names: &[String]) -> Option<&String> {
    names
        .iter()
        .enumerate()
        .find(|&(index, name)| names[..index].contains(name))
        .map(|(_, name)| name)
}

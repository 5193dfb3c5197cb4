//! Render graph compilation.
//!
//! This module turns a [`RenderGraph`] into an execution plan
//! ([`CompiledGraph`]). It performs:
//!
//! 1. **Binding validation** - every declared input must be bound
//! 2. **Topological sort** - producers before consumers, ties broken by
//!    insertion order so the same construction sequence always yields the
//!    same order
//! 3. **Cycle detection** - reports the passes on one cycle
//! 4. **Pruning** - in [`CompilationMode::ReachableOnly`], passes that do not
//!    contribute to the graph output are dropped
//! 5. **Resource lifetimes** - first and last use of every resource, used by
//!    the executor to release transient resources early
//!
//! Validation always covers the whole graph, so a cycle among pruned passes
//! is still an error.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = RenderGraph::new();
//! let depth = graph.create_pass(DepthPass::new(quads))?;
//! let linearize = graph.create_pass(LinearizeDepthPass::new())?;
//! graph.bind(linearize, "depth", depth, "depth")?;
//!
//! let compiled = compile(&graph, CompilationMode::Full)?;
//! assert_eq!(compiled.pass_order(), &[depth, linearize]);
//! ```

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{GraphError, GraphResult};
use crate::render_graph::{PassHandle, RenderGraph, ResourceHandle};

/// Which passes a compile keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompilationMode {
    /// Every pass in the graph is scheduled.
    #[default]
    Full,
    /// Only passes the graph output transitively depends on are scheduled.
    ReachableOnly,
}

/// Resource lifetime in terms of pass execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    /// Step of the producing pass
    pub first_use: usize,
    /// Step of the last consuming pass (the producer step if never read)
    pub last_use: usize,
}

/// A compiled render graph ready for execution.
///
/// Passes are executed sequentially in [`pass_order`](Self::pass_order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledGraph {
    mode: CompilationMode,
    pass_order: Vec<PassHandle>,
    pruned: Vec<PassHandle>,
    resource_lifetimes: HashMap<ResourceHandle, ResourceLifetime>,
    /// Resources whose last use is the pass at the same step.
    release_after: Vec<Vec<ResourceHandle>>,
}

impl CompiledGraph {
    pub fn mode(&self) -> CompilationMode {
        self.mode
    }

    /// Get the pass execution order as handles.
    pub fn pass_order(&self) -> &[PassHandle] {
        &self.pass_order
    }

    /// Get the number of passes in the compiled graph.
    pub fn pass_count(&self) -> usize {
        self.pass_order.len()
    }

    /// Check if the compiled graph is empty.
    pub fn is_empty(&self) -> bool {
        self.pass_order.is_empty()
    }

    /// Passes left out because they do not contribute to the graph output.
    pub fn pruned_passes(&self) -> &[PassHandle] {
        &self.pruned
    }

    pub fn resource_lifetime(&self, resource: ResourceHandle) -> Option<ResourceLifetime> {
        self.resource_lifetimes.get(&resource).copied()
    }

    /// Check if a resource is alive at a given execution step
    pub fn is_resource_alive(&self, resource: ResourceHandle, step: usize) -> bool {
        if let Some(lifetime) = self.resource_lifetimes.get(&resource) {
            step >= lifetime.first_use && step <= lifetime.last_use
        } else {
            false
        }
    }

    /// Resources that are no longer needed once the pass at `step` has run.
    ///
    /// Never contains the graph output.
    pub fn releases_after(&self, step: usize) -> &[ResourceHandle] {
        self.release_after
            .get(step)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Compile a render graph into an execution plan.
///
/// # Errors
///
/// * [`GraphError::UnboundInput`] - a declared input has no binding
/// * [`GraphError::Cycle`] - the dependency relation has a cycle
/// * [`GraphError::NoOutput`] - `ReachableOnly` without a graph output
pub fn compile(graph: &RenderGraph, mode: CompilationMode) -> GraphResult<CompiledGraph> {
    let nodes = graph.pass_nodes();

    for node in nodes {
        if let Some(input) = node.inputs.iter().find(|input| input.binding.is_none()) {
            return Err(GraphError::UnboundInput {
                pass: node.name.clone(),
                input: input.name.clone(),
            });
        }
    }

    let edges: Vec<(usize, usize)> = graph
        .edges()
        .into_iter()
        .map(|(dependent, dependency)| (dependent.index(), dependency.index()))
        .collect();

    let order = stable_topological_order(nodes.len(), &edges).map_err(|cycle| {
        GraphError::Cycle {
            passes: cycle.iter().map(|&index| nodes[index].name.clone()).collect(),
        }
    })?;

    let keep = match mode {
        CompilationMode::Full => vec![true; nodes.len()],
        CompilationMode::ReachableOnly => {
            let output = graph.output().ok_or(GraphError::NoOutput)?;
            let producer = graph
                .resource_info(output)
                .ok_or(GraphError::UnknownResource(output))?
                .producer;
            reachable_from(producer.index(), nodes.len(), &edges)
        }
    };

    let handle = |index: usize| PassHandle::new(graph.id(), index as u32);
    let (kept, pruned): (Vec<usize>, Vec<usize>) =
        order.into_iter().partition(|&index| keep[index]);
    let mut pruned: Vec<PassHandle> = pruned.into_iter().map(handle).collect();
    pruned.sort_by_key(|pass| pass.index());

    // Determine resource lifetimes
    let mut resource_lifetimes: HashMap<ResourceHandle, ResourceLifetime> = HashMap::new();
    for (step, &index) in kept.iter().enumerate() {
        let node = &nodes[index];
        let written = node.outputs.iter().map(|slot| slot.resource);
        let read = node.inputs.iter().filter_map(|slot| slot.binding);

        for resource in written.chain(read) {
            let lifetime = resource_lifetimes
                .entry(resource)
                .or_insert(ResourceLifetime {
                    first_use: step,
                    last_use: step,
                });
            lifetime.last_use = step;
        }
    }

    let mut release_after = vec![Vec::new(); kept.len()];
    for &index in &kept {
        for slot in &nodes[index].outputs {
            if graph.output() == Some(slot.resource) {
                continue;
            }
            if let Some(lifetime) = resource_lifetimes.get(&slot.resource) {
                release_after[lifetime.last_use].push(slot.resource);
            }
        }
    }

    let compiled = CompiledGraph {
        mode,
        pass_order: kept.into_iter().map(handle).collect(),
        pruned,
        resource_lifetimes,
        release_after,
    };

    log::debug!(
        "Compiled render graph '{}': {} passes scheduled, {} pruned",
        graph.config().label,
        compiled.pass_count(),
        compiled.pruned.len()
    );

    Ok(compiled)
}

/// Kahn's algorithm with a min-heap ready set.
///
/// `edges` are `(dependent, dependency)` index pairs. Among passes whose
/// dependencies are all scheduled, the lowest insertion index goes first.
/// On failure returns the passes of one cycle.
fn stable_topological_order(n: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>, Vec<usize>> {
    let mut in_degree = vec![0u32; n];
    let mut dependents = vec![Vec::new(); n];
    for &(dependent, dependency) in edges {
        in_degree[dependent] += 1;
        dependents[dependency].push(dependent);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&index| in_degree[index] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() == n {
        Ok(order)
    } else {
        Err(find_cycle(&in_degree, edges))
    }
}

/// Extract one cycle from the passes Kahn's algorithm could not schedule.
///
/// Every unscheduled pass has at least one unscheduled dependency, so
/// following those edges from any unscheduled pass must revisit a pass.
/// The cycle is returned in dependency order, starting at its lowest index
/// and closed by repeating that index.
fn find_cycle(in_degree: &[u32], edges: &[(usize, usize)]) -> Vec<usize> {
    let blocked = |index: usize| in_degree[index] > 0;
    let Some(start) = (0..in_degree.len()).find(|&index| blocked(index)) else {
        return Vec::new();
    };

    let mut position: Vec<Option<usize>> = vec![None; in_degree.len()];
    let mut path = vec![start];
    position[start] = Some(0);
    let mut current = start;

    loop {
        let next = edges
            .iter()
            .find(|&&(dependent, dependency)| dependent == current && blocked(dependency))
            .map(|&(_, dependency)| dependency);
        let Some(next) = next else {
            return path;
        };

        if let Some(first) = position[next] {
            // The path runs consumer -> producer; flip it to execution order.
            let mut cycle = path.split_off(first);
            cycle.reverse();
            if let Some(lowest) = cycle.iter().enumerate().min_by_key(|&(_, &i)| i).map(|(p, _)| p) {
                cycle.rotate_left(lowest);
            }
            cycle.push(cycle[0]);
            return cycle;
        }

        position[next] = Some(path.len());
        path.push(next);
        current = next;
    }
}

/// Mark the passes `target` transitively depends on, including itself.
fn reachable_from(target: usize, n: usize, edges: &[(usize, usize)]) -> Vec<bool> {
    let mut dependencies = vec![Vec::new(); n];
    for &(dependent, dependency) in edges {
        dependencies[dependent].push(dependency);
    }

    let mut reachable = vec![false; n];
    let mut stack = vec![target];
    while let Some(index) = stack.pop() {
        if std::mem::replace(&mut reachable[index], true) {
            continue;
        }
        stack.extend(dependencies[index].iter().copied());
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::CallbackPass;

    fn producer(name: &str, output: &str) -> CallbackPass {
        let output_name = output.to_string();
        CallbackPass::new(name)
            .with_output(output)
            .on_execute(move |ctx| ctx.write_output(&output_name, 0u32))
    }

    #[test]
    fn test_compile_empty_graph() {
        let graph = RenderGraph::new();
        let compiled = compile(&graph, CompilationMode::Full).unwrap();
        assert!(compiled.is_empty());
        assert_eq!(compiled.pass_count(), 0);
    }

    #[test]
    fn test_compile_linear_chain() {
        // C is inserted first but consumes B, which consumes A
        let mut graph = RenderGraph::new();
        let c = graph
            .create_pass(CallbackPass::new("C").with_input("in"))
            .unwrap();
        let b = graph
            .create_pass(producer("B", "out").with_input("in"))
            .unwrap();
        let a = graph.create_pass(producer("A", "out")).unwrap();

        graph.bind(b, "in", a, "out").unwrap();
        graph.bind(c, "in", b, "out").unwrap();

        let compiled = compile(&graph, CompilationMode::Full).unwrap();
        assert_eq!(compiled.pass_order(), &[a, b, c]);
    }

    #[test]
    fn test_independent_passes_keep_insertion_order() {
        let mut graph = RenderGraph::new();
        let a = graph.create_pass(producer("A", "out")).unwrap();
        let b = graph.create_pass(producer("B", "out")).unwrap();
        let c = graph.create_pass(producer("C", "out")).unwrap();

        let compiled = compile(&graph, CompilationMode::Full).unwrap();
        assert_eq!(compiled.pass_order(), &[a, b, c]);
    }

    #[test]
    fn test_diamond_tie_break() {
        //     A
        //    / \
        //   C   B   (C inserted before B)
        //    \ /
        //     D
        let mut graph = RenderGraph::new();
        let d = graph
            .create_pass(CallbackPass::new("D").with_input("left").with_input("right"))
            .unwrap();
        let c = graph
            .create_pass(producer("C", "out").with_input("in"))
            .unwrap();
        let b = graph
            .create_pass(producer("B", "out").with_input("in"))
            .unwrap();
        let a = graph.create_pass(producer("A", "out")).unwrap();

        graph.bind(b, "in", a, "out").unwrap();
        graph.bind(c, "in", a, "out").unwrap();
        graph.bind(d, "left", b, "out").unwrap();
        graph.bind(d, "right", c, "out").unwrap();

        let compiled = compile(&graph, CompilationMode::Full).unwrap();
        assert_eq!(compiled.pass_order(), &[a, c, b, d]);
    }

    #[test]
    fn test_explicit_dependency_orders_passes() {
        let mut graph = RenderGraph::new();
        let present = graph.create_pass(CallbackPass::new("present")).unwrap();
        let upload = graph.create_pass(CallbackPass::new("upload")).unwrap();
        graph.add_dependency(present, upload).unwrap();

        let compiled = compile(&graph, CompilationMode::Full).unwrap();
        assert_eq!(compiled.pass_order(), &[upload, present]);
    }

    #[test]
    fn test_unbound_input() {
        let mut graph = RenderGraph::new();
        graph
            .create_pass(CallbackPass::new("tonemap").with_input("hdr"))
            .unwrap();

        assert_eq!(
            compile(&graph, CompilationMode::Full),
            Err(GraphError::UnboundInput {
                pass: "tonemap".into(),
                input: "hdr".into(),
            })
        );
    }

    #[test]
    fn test_cycle_three_nodes() {
        let mut graph = RenderGraph::new();
        let a = graph.create_pass(producer("A", "out").with_input("in")).unwrap();
        let b = graph.create_pass(producer("B", "out").with_input("in")).unwrap();
        let c = graph.create_pass(producer("C", "out").with_input("in")).unwrap();
        graph.bind(b, "in", a, "out").unwrap();
        graph.bind(c, "in", b, "out").unwrap();
        graph.bind(a, "in", c, "out").unwrap();

        assert_eq!(
            compile(&graph, CompilationMode::Full),
            Err(GraphError::Cycle {
                passes: vec!["A".into(), "B".into(), "C".into(), "A".into()],
            })
        );
    }

    #[test]
    fn test_self_binding_is_a_cycle() {
        let mut graph = RenderGraph::new();
        let a = graph
            .create_pass(producer("feedback", "out").with_input("in"))
            .unwrap();
        graph.bind(a, "in", a, "out").unwrap();

        assert_eq!(
            compile(&graph, CompilationMode::Full),
            Err(GraphError::Cycle {
                passes: vec!["feedback".into(), "feedback".into()],
            })
        );
    }

    #[test]
    fn test_cycle_detected_in_pruned_part() {
        let mut graph = RenderGraph::new();
        let main = graph.create_pass(producer("main", "out")).unwrap();
        let a = graph.create_pass(producer("A", "out").with_input("in")).unwrap();
        let b = graph.create_pass(producer("B", "out").with_input("in")).unwrap();
        graph.bind(a, "in", b, "out").unwrap();
        graph.bind(b, "in", a, "out").unwrap();
        let output = graph.pass_output(main, "out").unwrap();
        graph.set_output(output).unwrap();

        assert!(matches!(
            compile(&graph, CompilationMode::ReachableOnly),
            Err(GraphError::Cycle { .. })
        ));
    }

    #[test]
    fn test_reachable_only_requires_output() {
        let mut graph = RenderGraph::new();
        graph.create_pass(producer("A", "out")).unwrap();
        assert_eq!(
            compile(&graph, CompilationMode::ReachableOnly),
            Err(GraphError::NoOutput)
        );
    }

    #[test]
    fn test_resource_lifetimes_and_releases() {
        // A -> B -> C, A also feeds C; output is C's
        let mut graph = RenderGraph::new();
        let a = graph.create_pass(producer("A", "out")).unwrap();
        let b = graph.create_pass(producer("B", "out").with_input("in")).unwrap();
        let c = graph
            .create_pass(producer("C", "out").with_input("first").with_input("second"))
            .unwrap();
        graph.bind(b, "in", a, "out").unwrap();
        graph.bind(c, "first", a, "out").unwrap();
        graph.bind(c, "second", b, "out").unwrap();
        let a_out = graph.pass_output(a, "out").unwrap();
        let b_out = graph.pass_output(b, "out").unwrap();
        let c_out = graph.pass_output(c, "out").unwrap();
        graph.set_output(c_out).unwrap();

        let compiled = compile(&graph, CompilationMode::Full).unwrap();
        assert_eq!(
            compiled.resource_lifetime(a_out),
            Some(ResourceLifetime {
                first_use: 0,
                last_use: 2
            })
        );
        assert!(compiled.is_resource_alive(b_out, 1));
        assert!(!compiled.is_resource_alive(b_out, 0));
        assert!(compiled.releases_after(0).is_empty());
        assert!(compiled.releases_after(1).is_empty());
        assert_eq!(compiled.releases_after(2), &[a_out, b_out]);
        assert!(compiled.releases_after(3).is_empty());
    }

    #[test]
    fn test_find_cycle_returns_lowest_index_first() {
        // 2 depends on 1, 1 on 3, 3 on 2; 0 depends on 2 but is not on the cycle
        let edges = [(2, 1), (1, 3), (3, 2), (0, 2)];
        let cycle = stable_topological_order(4, &edges).unwrap_err();
        assert_eq!(cycle, vec![1, 2, 3, 1]);
    }
}

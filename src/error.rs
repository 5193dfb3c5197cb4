//! Render graph error types.

use thiserror::Error;

use crate::render_graph::{PassHandle, ResourceHandle};

/// Result type for render graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while configuring, compiling or executing a render graph.
///
/// Configuration errors are returned by the call that caused them. Cycles and
/// unbound inputs can only be detected once the whole graph is known and are
/// returned by compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The resource handle is not an output of any pass in this graph.
    #[error("unknown resource {0:?}")]
    UnknownResource(ResourceHandle),

    /// An input could not be bound to the requested output.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// The dependency relation contains a cycle.
    ///
    /// `passes` lists the passes on one cycle in dependency order, with the
    /// first pass repeated at the end.
    #[error("render graph contains a dependency cycle: {}", .passes.join(" -> "))]
    Cycle { passes: Vec<String> },

    /// A pass declared the same output name twice.
    #[error("pass '{pass}' declares output '{output}' more than once")]
    DuplicateOutput { pass: String, output: String },

    /// A pass declared the same input name twice.
    #[error("pass '{pass}' declares input '{input}' more than once")]
    DuplicateInput { pass: String, input: String },

    /// A declared input has no binding at compile time.
    #[error("input '{input}' of pass '{pass}' is not bound to any output")]
    UnboundInput { pass: String, input: String },

    /// Reachable-only compilation needs a designated graph output.
    #[error("render graph has no designated output")]
    NoOutput,

    /// The graph was modified after its last compile.
    #[error("render graph topology changed since the last compile")]
    StaleTopology,

    /// A pass's setup no longer declares what it declared when it was created.
    #[error("pass '{pass}' changed its declared inputs or outputs since it was created")]
    DeclarationsChanged { pass: String },

    /// A pass returned without writing one of its declared outputs.
    #[error("pass '{pass}' did not write its declared output '{output}'")]
    MissingOutput { pass: String, output: String },

    /// A pass failed during execution; the frame is aborted.
    #[error("pass '{pass}' failed: {source}")]
    PassFailed {
        pass: String,
        #[source]
        source: PassError,
    },
}

/// Errors raised when wiring a pass input to a pass output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The pass handle was created by another graph (or before a `clear`).
    #[error("pass {0:?} does not belong to this render graph")]
    ForeignPass(PassHandle),

    /// The resource handle was created by another graph (or before a `clear`).
    #[error("resource {0:?} does not belong to this render graph")]
    ForeignResource(ResourceHandle),

    /// The producing pass has no output with this name.
    #[error("pass '{pass}' has no output named '{output}'")]
    UnknownOutput { pass: String, output: String },

    /// The consuming pass has no input with this name.
    #[error("pass '{pass}' has no input named '{input}'")]
    UnknownInput { pass: String, input: String },
}

/// Errors a pass reports from its execute step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    /// The pass asked for an input it never declared.
    #[error("no input named '{0}'")]
    UnknownInput(String),

    /// The input's resource holds no value this frame.
    #[error("input '{0}' has no value this frame")]
    MissingInput(String),

    /// The resource holds a value of another type.
    #[error("resource '{name}' is not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },

    /// The pass tried to write an output it never declared.
    #[error("no output named '{0}'")]
    UnknownOutput(String),

    /// Outputs are write-once per frame.
    #[error("output '{0}' was already written this frame")]
    OutputAlreadyWritten(String),

    /// Pass specific failure.
    #[error("{0}")]
    Failed(String),
}

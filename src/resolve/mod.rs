//! The resolve operation, its request contexts, and the middleware
//! pipeline they flow through.

pub(crate) mod context;
pub(crate) mod middleware;
pub(crate) mod operation;
pub(crate) mod pipeline;
pub(crate) mod stack;

pub use context::{DecoratorContext, DependencySegment, RequestContext, ResolveRequest};
pub use middleware::{
    ActivationMiddleware, DecorationMiddleware, ScopeSelectionMiddleware, SharingMiddleware,
};
pub use operation::ResolveOperation;
pub use pipeline::{
    Middleware, PipelineCursor, PipelinePhase, ResolvePipeline, ResolvePipelineBuilder,
};

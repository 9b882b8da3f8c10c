//! Diagnostic sinks for resolve traceability.
//!
//! Sinks observe operation and request lifecycle events as they flow
//! through the engine. All calls are synchronous fire-and-forget; keep
//! implementations lightweight.

use std::sync::{Arc, RwLock};

use crate::error::DiError;
use crate::registration::Instance;
use crate::resolve::{RequestContext, ResolveOperation};

/// Observer of resolve-operation and resolve-request events.
///
/// Register sinks on the root scope with
/// [`LifetimeScope::register_diagnostic_sink`](crate::LifetimeScope::register_diagnostic_sink);
/// every operation started anywhere in the scope tree reports to them.
///
/// # Examples
///
/// ```rust
/// use canopy_di::{DiagnosticSink, LifetimeScope, Registration, RequestContext};
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Default)]
/// struct Recorder {
///     requests: Mutex<Vec<&'static str>>,
/// }
///
/// impl DiagnosticSink for Recorder {
///     fn request_start(&self, ctx: &RequestContext) {
///         self.requests.lock().unwrap().push(ctx.service().display_name());
///     }
/// }
///
/// let root = LifetimeScope::root(|r| {
///     r.register(Registration::for_type::<u32>().activate_with(|_| Ok(7)).build());
/// });
/// let recorder = Arc::new(Recorder::default());
/// root.register_diagnostic_sink(recorder.clone());
///
/// root.resolve_typed::<u32>().unwrap();
/// assert_eq!(recorder.requests.lock().unwrap().len(), 1);
/// ```
pub trait DiagnosticSink: Send + Sync {
    /// Gates event emission; a disabled sink receives no events.
    fn is_enabled(&self) -> bool {
        true
    }

    /// A resolve operation is about to run its initiating request.
    fn operation_start(&self, _operation: &ResolveOperation) {}

    /// A resolve operation completed successfully.
    fn operation_success(&self, _operation: &ResolveOperation, _instance: &Instance) {}

    /// A resolve operation failed.
    fn operation_failure(&self, _operation: &ResolveOperation, _error: &DiError) {}

    /// A request context was created and is entering its pipeline.
    fn request_start(&self, _ctx: &RequestContext) {}

    /// A request's pipeline returned with an instance.
    fn request_success(&self, _ctx: &RequestContext) {}

    /// A request's pipeline failed.
    fn request_failure(&self, _ctx: &RequestContext, _error: &DiError) {}
}

/// Sink registry owned by the root scope.
#[derive(Default)]
pub(crate) struct Diagnostics {
    sinks: RwLock<Vec<Arc<dyn DiagnosticSink>>>,
}

impl Diagnostics {
    pub(crate) fn register(&self, sink: Arc<dyn DiagnosticSink>) {
        self.sinks.write().unwrap().push(sink);
    }

    pub(crate) fn operation_start(&self, operation: &ResolveOperation) {
        for sink in self.sinks.read().unwrap().iter() {
            if sink.is_enabled() {
                sink.operation_start(operation);
            }
        }
    }

    pub(crate) fn operation_success(&self, operation: &ResolveOperation, instance: &Instance) {
        for sink in self.sinks.read().unwrap().iter() {
            if sink.is_enabled() {
                sink.operation_success(operation, instance);
            }
        }
    }

    pub(crate) fn operation_failure(&self, operation: &ResolveOperation, error: &DiError) {
        for sink in self.sinks.read().unwrap().iter() {
            if sink.is_enabled() {
                sink.operation_failure(operation, error);
            }
        }
    }

    pub(crate) fn request_start(&self, ctx: &RequestContext) {
        for sink in self.sinks.read().unwrap().iter() {
            if sink.is_enabled() {
                sink.request_start(ctx);
            }
        }
    }

    pub(crate) fn request_success(&self, ctx: &RequestContext) {
        for sink in self.sinks.read().unwrap().iter() {
            if sink.is_enabled() {
                sink.request_success(ctx);
            }
        }
    }

    pub(crate) fn request_failure(&self, ctx: &RequestContext, error: &DiError) {
        for sink in self.sinks.read().unwrap().iter() {
            if sink.is_enabled() {
                sink.request_failure(ctx, error);
            }
        }
    }
}

/// Built-in sink that forwards events to the `tracing` subscriber.
#[cfg(feature = "logging")]
#[derive(Default)]
pub struct TracingDiagnosticSink;

#[cfg(feature = "logging")]
impl DiagnosticSink for TracingDiagnosticSink {
    fn operation_start(&self, operation: &ResolveOperation) {
        tracing::debug!(
            target: "canopy_di",
            service = operation.initiating_service_name().unwrap_or("<unknown>"),
            "resolve operation starting"
        );
    }

    fn operation_success(&self, operation: &ResolveOperation, _instance: &Instance) {
        tracing::debug!(
            target: "canopy_di",
            service = operation.initiating_service_name().unwrap_or("<unknown>"),
            "resolve operation succeeded"
        );
    }

    fn operation_failure(&self, operation: &ResolveOperation, error: &DiError) {
        tracing::warn!(
            target: "canopy_di",
            service = operation.initiating_service_name().unwrap_or("<unknown>"),
            error = %error,
            "resolve operation failed"
        );
    }

    fn request_start(&self, ctx: &RequestContext) {
        tracing::trace!(
            target: "canopy_di",
            service = ctx.service().display_name(),
            "resolve request starting"
        );
    }

    fn request_success(&self, ctx: &RequestContext) {
        tracing::trace!(
            target: "canopy_di",
            service = ctx.service().display_name(),
            "resolve request succeeded"
        );
    }

    fn request_failure(&self, ctx: &RequestContext, error: &DiError) {
        tracing::trace!(
            target: "canopy_di",
            service = ctx.service().display_name(),
            error = %error,
            "resolve request failed"
        );
    }
}

//! Built-in pipeline stages.

use crate::activator::ActivationContext;
use crate::error::{DiError, DiResult};
use crate::registration::{Ownership, Sharing};
use crate::resolve::context::{DecoratorContext, RequestContext, ResolveRequest};
use crate::resolve::pipeline::{Middleware, PipelineCursor, PipelinePhase};

/// Consults the registration's lifetime policy and redirects activation
/// to the scope it selects.
///
/// A required request fails (wrapped, naming the activator and its
/// services) when the policy finds no scope; a non-required request
/// short-circuits the pipeline without setting an instance.
pub struct ScopeSelectionMiddleware;

impl Middleware for ScopeSelectionMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::ScopeSelection
    }

    fn execute(&self, ctx: &RequestContext, next: &PipelineCursor<'_>) -> DiResult<()> {
        let lifetime = ctx.registration().lifetime().clone();
        if ctx.is_required() {
            let selected = lifetime
                .find_scope(&ctx.activation_scope())
                .map_err(|error| DiError::ResolutionFailed {
                    context: ctx.registration().description(),
                    source: Box::new(error),
                })?;
            ctx.change_scope(selected);
            next.invoke(ctx)
        } else {
            match lifetime.try_find_scope(&ctx.activation_scope()) {
                Some(selected) => {
                    ctx.change_scope(selected);
                    next.invoke(ctx)
                }
                None => Ok(()),
            }
        }
    }

    fn description(&self) -> &str {
        "scope selection"
    }
}

/// Routes shared registrations through the selected scope's
/// shared-instance store.
///
/// The creator runs the remainder of the pipeline; if it returns without
/// an instance nothing is recorded. The canonical instance, freshly
/// created or already cached, is written back to the context.
pub struct SharingMiddleware;

impl Middleware for SharingMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Sharing
    }

    fn execute(&self, ctx: &RequestContext, next: &PipelineCursor<'_>) -> DiResult<()> {
        if ctx.registration().sharing() != Sharing::Shared {
            return next.invoke(ctx);
        }
        let scope = ctx.activation_scope();
        let canonical = scope
            .create_shared_instance(ctx.registration().id(), ctx.sharing_qualifier(), || {
                next.invoke(ctx)?;
                Ok(ctx.instance())
            })
            .map_err(|error| match error {
                DiError::SelfConstructingDependency { .. } => DiError::SelfConstructingDependency {
                    component: ctx.service().description(),
                },
                other => other,
            })?;
        if let Some(instance) = canonical {
            ctx.set_instance(instance);
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "sharing"
    }
}

/// Runs the registration's activator and hands owned disposable
/// instances to the selected scope's disposer.
pub struct ActivationMiddleware;

impl Middleware for ActivationMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Activation
    }

    fn execute(&self, ctx: &RequestContext, next: &PipelineCursor<'_>) -> DiResult<()> {
        let activation = ActivationContext::new(ctx);
        let instance = ctx.registration().activator().activate(&activation)?;
        ctx.set_instance(instance.clone());

        if ctx.registration().ownership() == Ownership::OwnedByLifetimeScope {
            if let Some(binding) = ctx.registration().disposal_binding() {
                ctx.activation_scope().track_for_disposal(binding, &instance)?;
            }
        }
        next.invoke(ctx)
    }

    fn description(&self) -> &str {
        "activation"
    }
}

/// Wraps a produced instance in the decorators registered for its
/// service, in registration order, tracking the chain in a
/// [`DecoratorContext`].
///
/// Each layer is an internal resolve of the decorator's registration
/// with the previous instance as decorator target; shared layers cache
/// per decorated component via the sharing qualifier.
pub struct DecorationMiddleware;

impl Middleware for DecorationMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Decoration
    }

    fn execute(&self, ctx: &RequestContext, next: &PipelineCursor<'_>) -> DiResult<()> {
        // Decorator layers are not themselves decorated.
        if ctx.decorator_target().is_some() {
            return next.invoke(ctx);
        }

        next.invoke(ctx)?;

        let base = match ctx.instance() {
            Some(instance) => instance,
            None => return Ok(()),
        };
        let decorators = ctx
            .activation_scope()
            .registry()
            .decorators_for(ctx.service());
        if decorators.is_empty() {
            return Ok(());
        }

        let mut chain = DecoratorContext::for_target(ctx.service().clone(), base.clone());
        let mut current = base;
        for decorator in decorators {
            let layer_service = decorator
                .services()
                .first()
                .cloned()
                .unwrap_or_else(|| ctx.service().clone());
            let request = ResolveRequest::new(ctx.service().clone(), decorator)
                .with_parameter_seq(ctx.parameters())
                .decorating(current.clone(), ctx.registration().id());
            let wrapped = ctx.resolve_component(request)?;
            chain.record(layer_service, wrapped.clone());
            current = wrapped;
        }
        ctx.set_decorator_context(chain);
        ctx.set_instance(current);
        Ok(())
    }

    fn description(&self) -> &str {
        "decoration"
    }
}

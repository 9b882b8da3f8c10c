//! Activators produce raw instances for the activation pipeline phase.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::parameter::{named_parameter, typed_parameter, Parameter};
use crate::registration::Instance;
use crate::resolve::{DependencySegment, RequestContext, ResolveRequest};
use crate::scope::LifetimeScope;
use crate::service::Service;

/// Produces a raw instance given the state of the request being resolved.
///
/// Activators receive an [`ActivationContext`] exposing the activation
/// scope, the request's parameters, the decorator target (for decorator
/// registrations), and nested resolution routed through the owning
/// resolve operation so cycle detection and completion ordering stay
/// intact.
pub trait Activator: Send + Sync {
    /// Builds the instance.
    fn activate(&self, ctx: &ActivationContext<'_>) -> DiResult<Instance>;

    /// Human description used in error messages.
    fn description(&self) -> &str;
}

/// The view of a resolve request handed to an activator.
pub struct ActivationContext<'a> {
    ctx: &'a RequestContext,
}

impl<'a> ActivationContext<'a> {
    pub(crate) fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    /// The scope selected to own the activation.
    pub fn scope(&self) -> Arc<LifetimeScope> {
        self.ctx.activation_scope()
    }

    /// The request's parameter sequence.
    pub fn parameters(&self) -> Arc<[Parameter]> {
        self.ctx.parameters()
    }

    /// First parameter named `name` carrying a `T`.
    pub fn parameter_named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        named_parameter::<T>(&self.parameters(), name)
    }

    /// First parameter carrying a `T`.
    pub fn parameter_typed<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        typed_parameter::<T>(&self.parameters())
    }

    /// The instance this activation is decorating, when the request is a
    /// decorator layer.
    pub fn decorator_target(&self) -> Option<Instance> {
        self.ctx.decorator_target()
    }

    /// The decorator target downcast to `T`.
    pub fn decorated<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.decorator_target().and_then(|i| i.downcast::<T>().ok())
    }

    /// Resolves a dependency of type `T` as a nested request.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let service = Service::of::<T>();
        self.resolve_service(&service)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch {
                service: service.display_name(),
            })
    }

    /// Resolves a keyed dependency of type `T` as a nested request.
    pub fn resolve_keyed<T: Send + Sync + 'static>(
        &self,
        key: impl Into<std::borrow::Cow<'static, str>>,
    ) -> DiResult<Arc<T>> {
        let service = Service::keyed::<T>(key);
        self.resolve_service(&service)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch {
                service: service.display_name(),
            })
    }

    /// Resolves a dependency of type `T`, yielding `None` when it is not
    /// registered or its lifetime finds no owning scope.
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        let service = Service::of::<T>();
        let scope = self.scope();
        let registration = match scope.registry().default_registration_for(&service) {
            Some(r) => r,
            None => return Ok(None),
        };
        let request = ResolveRequest::new(service.clone(), registration);
        match self.ctx.try_resolve_component(request)? {
            Some(instance) => instance
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch {
                    service: service.display_name(),
                }),
            None => Ok(None),
        }
    }

    /// Resolves a service by identity as a nested request.
    pub fn resolve_service(&self, service: &Service) -> DiResult<Instance> {
        let scope = self.scope();
        let registration = scope
            .registry()
            .default_registration_for(service)
            .ok_or(DiError::NotRegistered {
                service: service.display_name(),
            })?;
        self.ctx
            .resolve_component(ResolveRequest::new(service.clone(), registration))
    }

    /// Issues a fully-specified nested resolve request.
    pub fn resolve_request(&self, request: ResolveRequest) -> DiResult<Instance> {
        self.ctx.resolve_component(request)
    }

    /// Opens a new segment on the request stack so this activator may
    /// re-enter the container for an independent sub-graph.
    ///
    /// While the segment is open, cycle detection ignores the requests
    /// already in progress beneath it; the previous boundary is restored
    /// when the returned guard drops.
    pub fn begin_dependency_segment(&self) -> DiResult<DependencySegment> {
        self.ctx.begin_dependency_segment()
    }
}

/// Activator backed by a user factory closure.
///
/// The workhorse activator: the closure receives the activation context
/// and returns the concrete component value.
pub struct DelegateActivator<T> {
    factory: Box<dyn Fn(&ActivationContext<'_>) -> DiResult<T> + Send + Sync>,
    description: String,
}

impl<T: Send + Sync + 'static> DelegateActivator<T> {
    /// Wraps `factory` as an activator for `T`.
    pub fn new(
        factory: impl Fn(&ActivationContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            description: format!("delegate activator for {}", std::any::type_name::<T>()),
        }
    }
}

impl<T: Send + Sync + 'static> Activator for DelegateActivator<T> {
    fn activate(&self, ctx: &ActivationContext<'_>) -> DiResult<Instance> {
        let value = (self.factory)(ctx)?;
        Ok(Arc::new(value))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Activator that hands out a pre-built instance.
///
/// Used for `Registration::provided_instance`; the instance is shared by
/// reference and externally owned unless the registration says otherwise.
pub struct ProvidedInstanceActivator {
    instance: Instance,
    description: String,
}

impl ProvidedInstanceActivator {
    /// Wraps an existing value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            instance: Arc::new(value),
            description: format!("provided instance of {}", std::any::type_name::<T>()),
        }
    }
}

impl Activator for ProvidedInstanceActivator {
    fn activate(&self, _ctx: &ActivationContext<'_>) -> DiResult<Instance> {
        Ok(self.instance.clone())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

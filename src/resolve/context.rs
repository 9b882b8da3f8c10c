//! Per-request state carried through the pipeline.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::parameter::Parameter;
use crate::registration::{Instance, Registration, RegistrationId};
use crate::resolve::operation::ResolveOperation;
use crate::resolve::pipeline::PipelinePhase;
use crate::scope::LifetimeScope;
use crate::service::Service;

/// The input to a resolve: a service, the registration satisfying it,
/// parameters, and, for decorator layers, the instance being wrapped.
#[derive(Clone)]
pub struct ResolveRequest {
    service: Service,
    registration: Arc<Registration>,
    parameters: Arc<[Parameter]>,
    decorator_target: Option<Instance>,
    sharing_qualifier: Option<RegistrationId>,
}

impl ResolveRequest {
    /// A request for `service` through `registration`, with no
    /// parameters.
    pub fn new(service: Service, registration: Arc<Registration>) -> Self {
        Self {
            service,
            registration,
            parameters: Arc::from(Vec::new().into_boxed_slice()),
            decorator_target: None,
            sharing_qualifier: None,
        }
    }

    /// Attaches parameters to the request.
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters = Arc::from(parameters.into_iter().collect::<Vec<_>>().into_boxed_slice());
        self
    }

    pub(crate) fn with_parameter_seq(mut self, parameters: Arc<[Parameter]>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Marks the request as a decorator layer wrapping `target`, which
    /// was produced by the registration identified by `qualifier`.
    /// Shared decorator layers cache under `(decorator id, qualifier)`.
    pub fn decorating(mut self, target: Instance, qualifier: RegistrationId) -> Self {
        self.decorator_target = Some(target);
        self.sharing_qualifier = Some(qualifier);
        self
    }

    /// The requested service.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// The registration satisfying the request.
    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }
}

/// Ordered record of the decorator layers applied to a target service.
///
/// Seeded with the undecorated instance; each wrap appends a
/// `(service, instance)` pair in application order.
#[derive(Clone)]
pub struct DecoratorContext {
    applied: Vec<(Service, Instance)>,
}

impl DecoratorContext {
    pub(crate) fn for_target(service: Service, instance: Instance) -> Self {
        Self {
            applied: vec![(service, instance)],
        }
    }

    pub(crate) fn record(&mut self, service: Service, instance: Instance) {
        self.applied.push((service, instance));
    }

    /// The outermost instance after all applied layers.
    pub fn current_instance(&self) -> Instance {
        self.applied
            .last()
            .map(|(_, i)| i.clone())
            .expect("decorator context is seeded with its target")
    }

    /// Every layer in application order, starting with the undecorated
    /// target.
    pub fn applied_decorators(&self) -> &[(Service, Instance)] {
        &self.applied
    }
}

/// Guard for a segment opened on the request stack.
///
/// While alive, cycle detection ignores the requests in progress beneath
/// the segment boundary; dropping the guard restores the previous
/// boundary.
pub struct DependencySegment {
    operation: Weak<ResolveOperation>,
    previous_boundary: usize,
}

impl DependencySegment {
    pub(crate) fn new(operation: Weak<ResolveOperation>, previous_boundary: usize) -> Self {
        Self {
            operation,
            previous_boundary,
        }
    }
}

impl Drop for DependencySegment {
    fn drop(&mut self) {
        if let Some(operation) = self.operation.upgrade() {
            operation.exit_segment(self.previous_boundary);
        }
    }
}

/// Mutable state for one request's traversal of the pipeline.
///
/// Contexts belong to a single resolve operation and never cross
/// threads; middleware receives a shared reference and mutates through
/// the interior-mutability setters below.
pub struct RequestContext {
    operation: Weak<ResolveOperation>,
    service: Service,
    registration: Arc<Registration>,
    parameters: RefCell<Arc<[Parameter]>>,
    activation_scope: RefCell<Arc<LifetimeScope>>,
    instance: RefCell<Option<Instance>>,
    phase_reached: Cell<PipelinePhase>,
    decorator_target: Option<Instance>,
    sharing_qualifier: Option<RegistrationId>,
    decorator_context: RefCell<Option<DecoratorContext>>,
    required: bool,
    completing: RefCell<Vec<Box<dyn FnOnce(&RequestContext)>>>,
    completed: Cell<bool>,
}

impl RequestContext {
    pub(crate) fn new(
        operation: Weak<ResolveOperation>,
        scope: Arc<LifetimeScope>,
        request: ResolveRequest,
        required: bool,
    ) -> Rc<Self> {
        Rc::new(Self {
            operation,
            service: request.service,
            registration: request.registration,
            parameters: RefCell::new(request.parameters),
            activation_scope: RefCell::new(scope),
            instance: RefCell::new(None),
            phase_reached: Cell::new(PipelinePhase::ResolveRequestStart),
            decorator_target: request.decorator_target,
            sharing_qualifier: request.sharing_qualifier,
            decorator_context: RefCell::new(None),
            required,
            completing: RefCell::new(Vec::new()),
            completed: Cell::new(false),
        })
    }

    /// The requested service.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// The registration being resolved.
    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    /// The request's parameter sequence.
    pub fn parameters(&self) -> Arc<[Parameter]> {
        self.parameters.borrow().clone()
    }

    /// Replaces the parameter sequence seen by later stages.
    pub fn change_parameters(&self, parameters: impl IntoIterator<Item = Parameter>) {
        *self.parameters.borrow_mut() =
            Arc::from(parameters.into_iter().collect::<Vec<_>>().into_boxed_slice());
    }

    /// The scope instances will be activated in.
    pub fn activation_scope(&self) -> Arc<LifetimeScope> {
        self.activation_scope.borrow().clone()
    }

    /// Redirects activation to `scope`, as selected by the registration's
    /// lifetime policy.
    pub fn change_scope(&self, scope: Arc<LifetimeScope>) {
        *self.activation_scope.borrow_mut() = scope;
    }

    /// The instance produced so far, if any.
    pub fn instance(&self) -> Option<Instance> {
        self.instance.borrow().clone()
    }

    /// Stores the produced instance. The write-only setter takes a live
    /// instance by construction; once set, the slot never reverts to
    /// empty.
    pub fn set_instance(&self, instance: Instance) {
        *self.instance.borrow_mut() = Some(instance);
    }

    /// The deepest pipeline phase this request has reached.
    pub fn phase_reached(&self) -> PipelinePhase {
        self.phase_reached.get()
    }

    pub(crate) fn advance_phase(&self, phase: PipelinePhase) {
        if phase > self.phase_reached.get() {
            self.phase_reached.set(phase);
        }
    }

    /// True when the pipeline activated a fresh instance for this
    /// request, as opposed to serving one from a shared-instance store.
    pub fn new_instance_activated(&self) -> bool {
        self.instance.borrow().is_some() && self.phase_reached.get() == PipelinePhase::Activation
    }

    /// Whether absence is an error for this request.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The instance this request decorates, when it is a decorator
    /// layer.
    pub fn decorator_target(&self) -> Option<Instance> {
        self.decorator_target.clone()
    }

    pub(crate) fn sharing_qualifier(&self) -> Option<RegistrationId> {
        self.sharing_qualifier
    }

    /// The decorator chain applied on behalf of this request, if any.
    pub fn decorator_context(&self) -> Option<DecoratorContext> {
        self.decorator_context.borrow().clone()
    }

    pub(crate) fn set_decorator_context(&self, context: DecoratorContext) {
        *self.decorator_context.borrow_mut() = Some(context);
    }

    /// Registers a handler fired exactly once when this request
    /// completes, after the operation's outermost request returns.
    pub fn on_completing(&self, handler: impl FnOnce(&RequestContext) + 'static) {
        self.completing.borrow_mut().push(Box::new(handler));
    }

    /// Fires the completing handlers. Idempotent.
    pub(crate) fn complete_request(&self) {
        if self.completed.replace(true) {
            return;
        }
        loop {
            let handlers = std::mem::take(&mut *self.completing.borrow_mut());
            if handlers.is_empty() {
                break;
            }
            for handler in handlers {
                handler(self);
            }
        }
    }

    pub(crate) fn operation(&self) -> DiResult<Rc<ResolveOperation>> {
        self.operation.upgrade().ok_or(DiError::OperationDisposed)
    }

    /// Resolves a dependency as a nested request of the same operation,
    /// preserving cycle detection and completion ordering.
    pub fn resolve_component(&self, request: ResolveRequest) -> DiResult<Instance> {
        let operation = self.operation()?;
        let scope = self.activation_scope();
        let service = request.service().display_name();
        operation
            .get_or_create_instance(&scope, request, true)?
            .ok_or(DiError::PipelineCompletedWithNoInstance { service })
    }

    /// As [`resolve_component`](Self::resolve_component), but absence
    /// short-circuits to `None` instead of failing.
    pub fn try_resolve_component(&self, request: ResolveRequest) -> DiResult<Option<Instance>> {
        let operation = self.operation()?;
        let scope = self.activation_scope();
        operation.get_or_create_instance(&scope, request, false)
    }

    /// Opens a new segment on the operation's request stack; see
    /// [`DependencySegment`].
    pub fn begin_dependency_segment(&self) -> DiResult<DependencySegment> {
        let operation = self.operation()?;
        Ok(operation.enter_segment())
    }
}

//! Orchestration of one user-initiated resolution.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::error::{DiError, DiResult};
use crate::events::LocalCallbacks;
use crate::registration::Instance;
use crate::resolve::context::{DependencySegment, RequestContext, ResolveRequest};
use crate::resolve::stack::SegmentedStack;
use crate::scope::LifetimeScope;
use crate::service::Service;

// Backstop against runaway dependency graphs; cycle detection catches
// genuine cycles long before this.
const MAX_RESOLVE_DEPTH: usize = 1024;

/// Sequences one top-level resolve and every nested activation it
/// triggers.
///
/// An operation is created per call to `LifetimeScope::resolve`, runs on
/// a single carrier thread, tracks the in-progress request stack for
/// cycle detection, and fires completion callbacks for successful
/// requests in push order once its outermost request returns. It ends
/// exactly once; reuse fails with [`DiError::OperationDisposed`].
pub struct ResolveOperation {
    self_weak: Weak<ResolveOperation>,
    scope_at_start: Arc<LifetimeScope>,
    current_scope: RefCell<Arc<LifetimeScope>>,
    stack: RefCell<SegmentedStack<Rc<RequestContext>>>,
    successful: RefCell<Vec<Rc<RequestContext>>>,
    next_complete_start: Cell<usize>,
    request_depth: Cell<usize>,
    initiating_service: RefCell<Option<Service>>,
    active_context: RefCell<Option<Rc<RequestContext>>>,
    ended: Cell<bool>,
    request_beginning: LocalCallbacks<RequestContext>,
    operation_ending: RefCell<Vec<Rc<dyn Fn(&ResolveOperation, Option<&DiError>)>>>,
    diagnostics: Arc<Diagnostics>,
}

impl ResolveOperation {
    pub(crate) fn new(scope: &Arc<LifetimeScope>) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            self_weak: weak.clone(),
            scope_at_start: scope.clone(),
            current_scope: RefCell::new(scope.clone()),
            stack: RefCell::new(SegmentedStack::default()),
            successful: RefCell::new(Vec::new()),
            next_complete_start: Cell::new(0),
            request_depth: Cell::new(0),
            initiating_service: RefCell::new(None),
            active_context: RefCell::new(None),
            ended: Cell::new(false),
            request_beginning: LocalCallbacks::default(),
            operation_ending: RefCell::new(Vec::new()),
            diagnostics: scope.diagnostics(),
        })
    }

    /// The scope the operation was started from.
    pub fn scope_at_start(&self) -> &Arc<LifetimeScope> {
        &self.scope_at_start
    }

    /// The scope of the request currently being resolved.
    pub fn current_scope(&self) -> Arc<LifetimeScope> {
        self.current_scope.borrow().clone()
    }

    /// How many requests are currently in flight.
    pub fn request_depth(&self) -> usize {
        self.request_depth.get()
    }

    /// True once the operation has completed or failed.
    pub fn ended(&self) -> bool {
        self.ended.get()
    }

    /// Display name of the service the operation was started for.
    pub fn initiating_service_name(&self) -> Option<&'static str> {
        self.initiating_service
            .borrow()
            .as_ref()
            .map(Service::display_name)
    }

    /// Subscribes to `resolve_request_beginning`: fired for every request
    /// context, strictly before its pipeline begins and before any
    /// nested request's own beginning event.
    pub fn on_request_beginning(&self, handler: impl Fn(&RequestContext) + 'static) {
        self.request_beginning.subscribe(handler);
    }

    /// Subscribes to `current_operation_ending`: fired exactly once,
    /// with the failure when the operation ends in one.
    pub fn on_operation_ending(
        &self,
        handler: impl Fn(&ResolveOperation, Option<&DiError>) + 'static,
    ) {
        self.operation_ending.borrow_mut().push(Rc::new(handler));
    }

    fn fire_operation_ending(&self, error: Option<&DiError>) {
        let snapshot: Vec<_> = self.operation_ending.borrow().clone();
        for handler in snapshot {
            handler(self, error);
        }
    }

    /// Runs the operation's initiating request; absence is an error.
    pub(crate) fn execute(&self, request: ResolveRequest) -> DiResult<Instance> {
        let service = request.service().display_name();
        self.run(request, true)?
            .ok_or(DiError::PipelineCompletedWithNoInstance { service })
    }

    /// Runs the operation's initiating request; absence yields `None`.
    pub(crate) fn try_execute(&self, request: ResolveRequest) -> DiResult<Option<Instance>> {
        self.run(request, false)
    }

    fn run(&self, request: ResolveRequest, required: bool) -> DiResult<Option<Instance>> {
        if self.ended.get() {
            return Err(DiError::OperationDisposed);
        }
        self.initiating_service
            .replace(Some(request.service().clone()));
        let boundary_context = request.service().description();
        self.diagnostics.operation_start(self);

        let scope = self.current_scope.borrow().clone();
        let result = self.get_or_create_instance(&scope, request, required);

        // User activator failures get the umbrella wrapper here; errors
        // already typed by the engine surface as-is.
        let result = match result {
            Err(error @ DiError::ActivatorFailed { .. }) => Err(DiError::ResolutionFailed {
                context: boundary_context,
                source: Box::new(error),
            }),
            other => other,
        };

        self.ended.set(true);
        match &result {
            Ok(Some(instance)) => {
                self.diagnostics.operation_success(self, instance);
                self.fire_operation_ending(None);
            }
            Ok(None) => {
                self.fire_operation_ending(None);
            }
            Err(error) => {
                self.diagnostics.operation_failure(self, error);
                self.fire_operation_ending(Some(error));
            }
        }
        result
    }

    /// Resolves one request (the initiating one or a nested dependency)
    /// through its registration's pipeline.
    pub(crate) fn get_or_create_instance(
        &self,
        scope: &Arc<LifetimeScope>,
        request: ResolveRequest,
        required: bool,
    ) -> DiResult<Option<Instance>> {
        if self.ended.get() {
            return Err(DiError::OperationDisposed);
        }

        // A request already in progress within the current segment is a
        // cycle; entries beneath the segment boundary are legal re-entry.
        {
            let stack = self.stack.borrow();
            if stack
                .iter_current_segment()
                .any(|c| c.registration().id() == request.registration().id())
            {
                let mut path: Vec<String> = stack
                    .iter_current_segment()
                    .map(|c| c.service().description())
                    .collect();
                path.push(request.service().description());
                return Err(DiError::CircularDependency { path });
            }
        }

        let depth = self.request_depth.get();
        if depth >= MAX_RESOLVE_DEPTH {
            return Err(DiError::DepthExceeded(depth));
        }

        let pipeline = scope
            .registry()
            .pipeline_for(request.service(), request.registration());
        let ctx = RequestContext::new(self.self_weak.clone(), scope.clone(), request, required);
        self.request_beginning.fire(&ctx);

        let prior_active = self.active_context.replace(Some(ctx.clone()));
        let prior_scope = self.current_scope.replace(ctx.activation_scope());
        self.request_depth.set(depth + 1);
        self.stack.borrow_mut().push(ctx.clone());
        self.diagnostics.request_start(&ctx);

        let pipeline_result = pipeline.invoke(&ctx);

        self.stack.borrow_mut().pop();
        self.active_context.replace(prior_active);
        self.current_scope.replace(prior_scope);
        self.request_depth.set(self.request_depth.get() - 1);

        let outcome = match pipeline_result {
            Ok(()) => match ctx.instance() {
                Some(instance) => {
                    self.successful.borrow_mut().push(ctx.clone());
                    self.diagnostics.request_success(&ctx);
                    Ok(Some(instance))
                }
                None if required => {
                    let error = DiError::PipelineCompletedWithNoInstance {
                        service: ctx.service().display_name(),
                    };
                    self.diagnostics.request_failure(&ctx, &error);
                    Err(error)
                }
                None => Ok(None),
            },
            Err(error) => {
                self.diagnostics.request_failure(&ctx, &error);
                Err(error)
            }
        };

        if self.stack.borrow().is_empty() {
            self.run_completion_wave();
        }
        outcome
    }

    // Fires complete_request on every successful context recorded since
    // the previous wave, in push order. The cursor advances before each
    // firing so handlers that trigger further resolves (and with them
    // recursive waves) cannot double-fire an entry.
    fn run_completion_wave(&self) {
        loop {
            let next = self.next_complete_start.get();
            let ctx = {
                let successful = self.successful.borrow();
                match successful.get(next) {
                    Some(ctx) => ctx.clone(),
                    None => break,
                }
            };
            self.next_complete_start.set(next + 1);
            ctx.complete_request();
        }
    }

    pub(crate) fn enter_segment(&self) -> DependencySegment {
        let previous = self.stack.borrow_mut().enter_segment();
        DependencySegment::new(self.self_weak.clone(), previous)
    }

    pub(crate) fn exit_segment(&self, previous_boundary: usize) {
        self.stack.borrow_mut().exit_segment(previous_boundary);
    }
}
